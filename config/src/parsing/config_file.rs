//! Parsing logic for a separate node config file
//!
//! A TOML file's keys map to CLI flags: `key = value` becomes `--key value`,
//! `key = true` becomes `--key`, and arrays repeat the flag

use std::fs;

use toml::{Value, map::Map};

use crate::{NodeConfig, parsing::parse_config_from_arg_list};

/// The CLI argument name for the config file
const CONFIG_FILE_ARG: &str = "--config-file";

/// Parse args from the config file named in the CLI args, if any
pub(crate) fn config_file_args(cli_args: &[String]) -> Result<Vec<String>, String> {
    let Some(index) = cli_args.iter().position(|arg| arg == CONFIG_FILE_ARG) else {
        return Ok(vec![]);
    };

    let path = cli_args
        .get(index + 1)
        .ok_or_else(|| format!("{CONFIG_FILE_ARG} requires a path"))?;
    read_config_file(path)
}

/// Parse a config entirely from a file
pub fn parse_config_from_file(path: &str) -> Result<NodeConfig, String> {
    let mut file_args = read_config_file(path)?;
    file_args.insert(0, "shadowsats-node".to_string());
    parse_config_from_arg_list(file_args)
}

/// Read a config file into a list of CLI args
fn read_config_file(path: &str) -> Result<Vec<String>, String> {
    let file_contents = fs::read_to_string(path).map_err(|err| err.to_string())?;
    let config_kv_pairs: Map<_, _> =
        toml::from_str(&file_contents).map_err(|err| err.to_string())?;

    let mut config_file_args: Vec<String> = Vec::with_capacity(config_kv_pairs.len());
    for (toml_key, value) in config_kv_pairs.iter() {
        let cli_arg = format!("--{toml_key}");
        config_file_args.extend(parse_toml_value(cli_arg, value)?);
    }

    Ok(config_file_args)
}

// ----------------
// | TOML Parsing |
// ----------------

/// Parse a toml value into a list of strings to append to the CLI args
fn parse_toml_value(cli_arg: String, val: &Value) -> Result<Vec<String>, String> {
    match val {
        Value::Boolean(b) => Ok(if *b { vec![cli_arg] } else { vec![] }),
        Value::Array(arr) => {
            let mut res = Vec::with_capacity(2 * arr.len());
            for v in arr.iter() {
                res.push(cli_arg.clone());
                res.push(toml_value_to_string(v)?);
            }
            Ok(res)
        },
        x => Ok(vec![cli_arg, toml_value_to_string(x)?]),
    }
}

/// Convert a scalar toml value to a CLI string
fn toml_value_to_string(val: &Value) -> Result<String, String> {
    Ok(match val {
        Value::String(val) => val.clone(),
        Value::Integer(val) => val.to_string(),
        Value::Float(val) => val.to_string(),
        Value::Boolean(val) => val.to_string(),
        _ => return Err(format!("unsupported config value: {val}")),
    })
}

#[cfg(test)]
mod test {
    use std::{io::Write, time::Duration};

    use tempfile::NamedTempFile;

    use super::*;

    /// Write a config file with the given contents
    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    /// Tests parsing a config entirely from a file
    #[test]
    fn test_parse_from_file() {
        let file = write_config(
            r#"
            max-batch-orders = 12
            submission-timeout-ms = 90000
            json-logs = true
            enable-metrics = false
            "#,
        );

        let config = parse_config_from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.max_batch_orders, 12);
        assert_eq!(config.submission_timeout, Duration::from_secs(90));
        assert!(config.json_logs);
        assert!(!config.metrics_enabled);
    }

    /// Tests that command line arguments take precedence over the file
    #[test]
    fn test_cli_overrides_file() {
        let file = write_config("max-batch-orders = 12\nproof-timeout-ms = 500\n");
        let path = file.path().to_str().unwrap().to_string();

        let args: Vec<String> =
            ["shadowsats-node", "--config-file", &path, "--max-batch-orders", "4"]
                .iter()
                .map(|s| s.to_string())
                .collect();
        let config = parse_config_from_arg_list(args).unwrap();

        assert_eq!(config.max_batch_orders, 4);
        assert_eq!(config.proof_timeout, Duration::from_millis(500));
    }

    /// Tests that malformed files are rejected
    #[test]
    fn test_bad_file() {
        let file = write_config("max-batch-orders = { nested = 1 }\n");
        assert!(parse_config_from_file(file.path().to_str().unwrap()).is_err());
        assert!(parse_config_from_file("/nonexistent/shadowsats.toml").is_err());

        let args = vec!["shadowsats-node".to_string(), CONFIG_FILE_ARG.to_string()];
        assert!(config_file_args(&args).is_err());
    }
}
