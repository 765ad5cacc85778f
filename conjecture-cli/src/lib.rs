use std::path::PathBuf;

use colored::*;

use conjecture_core::ChoiceValue;

pub mod inventory;

/// Where `cargo conjecture db` looks when neither `--path` nor
/// `CONJECTURE_DATABASE` says otherwise.
pub const DEFAULT_DATABASE_DIR: &str = ".conjecture/examples";

/// The database directory to inspect: `--path` first, then the
/// `CONJECTURE_DATABASE` value, then the default.
pub fn database_root(path: Option<PathBuf>, from_env: Option<String>) -> PathBuf {
    path.or_else(|| from_env.filter(|p| !p.is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_DIR))
}

/// Highlight the interesting lines of `cargo test` output.
pub fn enhance_test_output(stdout: &str, stderr: &str) -> String {
    let mut enhanced = String::new();

    for line in stdout.lines() {
        if line.contains("Falsifying example") || line.contains("Minimal counterexample") {
            enhanced.push_str(&format!("COUNTER: {}\n", line.bright_cyan()));
        } else if line.contains("Reproduce with") || line.contains("CONJECTURE_REPLAY") {
            enhanced.push_str(&format!("REPLAY: {}\n", line.bright_yellow()));
        } else if line.contains("is flaky") || line.contains("gave up after") {
            enhanced.push_str(&format!("WARN: {}\n", line.bright_magenta()));
        } else if line.contains("FAILED") || line.contains("panicked") || line.contains("✗") {
            enhanced.push_str(&format!("FAIL: {}\n", line.bright_red()));
        } else if line.contains("✓") || line.ends_with("... ok") {
            enhanced.push_str(&format!("PASS: {}\n", line.bright_green()));
        } else {
            enhanced.push_str(&format!("{}\n", line));
        }
    }

    if !stderr.is_empty() {
        enhanced.push_str("\nstderr:\n");
        enhanced.push_str(&stderr.bright_red().to_string());
    }

    enhanced
}

/// Format the settings a test run was started with.
pub fn format_config_output(seed: Option<u64>, replay: &[String], release: bool, pattern: Option<&str>) -> String {
    let mut output = String::new();
    output.push_str("Configuration:\n");
    output.push_str(&format!(
        "  Release mode: {}\n",
        if release {
            "enabled".bright_green()
        } else {
            "disabled".bright_red()
        }
    ));
    match seed {
        Some(seed) => output.push_str(&format!("  Seed: {}\n", seed.to_string().bright_yellow())),
        None => output.push_str(&format!("  Seed: {}\n", "random".bright_white())),
    }
    for blob in replay {
        output.push_str(&format!("  Replay: {}\n", blob.bright_yellow()));
    }
    if let Some(pattern) = pattern {
        output.push_str(&format!("  Test pattern: {}\n", pattern.bright_yellow()));
    }
    output
}

pub fn format_header() -> String {
    format!(
        "{}\n{}\n\n",
        "Conjecture Property Testing".bright_green().bold(),
        "===========================".bright_green()
    )
}

pub fn format_success() -> String {
    format!("{}\n", "All property tests passed!".bright_green().bold())
}

pub fn format_failure() -> String {
    format!("{}\n", "Some property tests failed!".bright_red().bold())
}

pub fn format_database_header(root: &str) -> String {
    format!(
        "{}\n{}\n\n",
        format!("Example database at {}", root).bright_cyan().bold(),
        "=".repeat(20 + root.chars().count()).bright_cyan()
    )
}

/// Render a choice sequence one choice per line.
pub fn format_choices(choices: &[ChoiceValue]) -> String {
    if choices.is_empty() {
        return "  (no choices)\n".to_string();
    }
    choices
        .iter()
        .enumerate()
        .map(|(i, choice)| format!("  {:>3}: {:<8} {}\n", i, choice.kind().to_string(), choice))
        .collect()
}

pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Parse a hex string. Whitespace is ignored so dumps can be pasted as is.
pub fn parse_hex(text: &str) -> anyhow::Result<Vec<u8>> {
    let digits: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() % 2 != 0 {
        anyhow::bail!("hex input has an odd number of digits");
    }
    digits
        .chunks(2)
        .map(|pair| {
            let high = pair[0].to_digit(16);
            let low = pair[1].to_digit(16);
            match (high, low) {
                (Some(h), Some(l)) => Ok((h * 16 + l) as u8),
                _ => anyhow::bail!("invalid hex digit in {:?}", pair.iter().collect::<String>()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enhance_test_output_empty() {
        assert_eq!(enhance_test_output("", ""), "");
    }

    #[test]
    fn test_enhance_test_output_counterexample() {
        let result = enhance_test_output("Minimal counterexample: [10000]", "");
        assert!(result.contains("COUNTER:"));
        assert!(result.contains("10000"));
    }

    #[test]
    fn test_enhance_test_output_replay() {
        let result = enhance_test_output("Reproduce with CONJECTURE_REPLAY=AQAAAA", "");
        assert!(result.contains("REPLAY:"));
    }

    #[test]
    fn test_enhance_test_output_failure_and_pass() {
        let result = enhance_test_output("test a ... ok\ntest b ... FAILED", "");
        assert!(result.contains("PASS:"));
        assert!(result.contains("FAIL:"));
    }

    #[test]
    fn test_enhance_test_output_flaky() {
        let result = enhance_test_output("  ⚐ prop_sum is flaky: did not reproduce", "");
        assert!(result.contains("WARN:"));
    }

    #[test]
    fn test_enhance_test_output_with_stderr() {
        let result = enhance_test_output("test output", "compilation error");
        assert!(result.contains("test output"));
        assert!(result.contains("stderr:"));
        assert!(result.contains("compilation error"));
    }

    #[test]
    fn test_format_config_output() {
        let blobs = vec!["AQAAAAAA".to_string()];
        let output = format_config_output(Some(42), &blobs, true, Some("sum"));
        assert!(output.contains("Configuration:"));
        assert!(output.contains("42"));
        assert!(output.contains("AQAAAAAA"));
        assert!(output.contains("sum"));

        let output = format_config_output(None, &[], false, None);
        assert!(output.contains("random"));
        assert!(!output.contains("Test pattern"));
    }

    #[test]
    fn test_format_messages() {
        assert!(format_header().contains("Conjecture Property Testing"));
        assert!(format_success().contains("passed"));
        assert!(format_failure().contains("failed"));
        assert!(format_database_header("db").contains("Example database at db"));
    }

    #[test]
    fn test_format_choices() {
        let output = format_choices(&[ChoiceValue::Integer(7), ChoiceValue::Boolean(true)]);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains('7'));
        assert!(lines[1].contains("true"));
        assert_eq!(format_choices(&[]), "  (no choices)\n");
    }

    #[test]
    fn test_database_root_precedence() {
        let flag = Some(PathBuf::from("flag"));
        assert_eq!(database_root(flag, Some("env".into())), PathBuf::from("flag"));
        assert_eq!(database_root(None, Some("env".into())), PathBuf::from("env"));
        assert_eq!(database_root(None, Some(String::new())), PathBuf::from(DEFAULT_DATABASE_DIR));
        assert_eq!(database_root(None, None), PathBuf::from(DEFAULT_DATABASE_DIR));
    }

    #[test]
    fn test_hex_round_trip() {
        let bytes = vec![0x00, 0x7f, 0xff, 0x10];
        assert_eq!(to_hex(&bytes), "007fff10");
        assert_eq!(parse_hex("00 7f FF\n10").unwrap(), bytes);
        assert!(parse_hex("abc").is_err());
        assert!(parse_hex("zz").is_err());
        assert!(parse_hex("").unwrap().is_empty());
    }
}
