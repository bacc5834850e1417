use std::{collections::BTreeMap, path::Path};

use {
    anyhow::Result,
    clap::Subcommand,
    helix_config::HelixConfig,
    helix_telegram::TelegramAccountConfig,
    serde_json::{Value, json},
};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective draft settings and configured accounts.
    Show,
}

pub fn handle_config(
    config: &HelixConfig,
    explicit_path: Option<&Path>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let path = explicit_path
                .map(Path::to_path_buf)
                .or_else(helix_config::find_config_file);
            match &path {
                Some(path) => eprintln!("Using {}\n", path.display()),
                None => eprintln!("No config file found; showing defaults.\n"),
            }
            println!("{}", serde_json::to_string_pretty(&render(config))?);
            Ok(())
        },
    }
}

/// Effective settings: the shared draft defaults, then each Telegram account
/// with its overrides applied. Accounts that fail to parse show the error.
fn render(config: &HelixConfig) -> Value {
    let base = config.draft.clone().normalized();
    let accounts: BTreeMap<&str, Value> = config
        .channels
        .telegram
        .iter()
        .map(|(id, raw)| {
            let entry = match serde_json::from_value::<TelegramAccountConfig>(raw.clone()) {
                Ok(account) => json!({
                    "stream_mode": account.stream_mode,
                    "silent": account.silent,
                    "has_token": account.has_token(),
                    "draft": account.draft_config(&base),
                }),
                Err(e) => json!({ "error": e.to_string() }),
            };
            (id.as_str(), entry)
        })
        .collect();

    json!({
        "draft": base,
        "telegram": accounts,
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, std::io::Write};

    #[test]
    fn render_defaults() {
        let out = render(&HelixConfig::default());
        assert_eq!(out["draft"]["throttle_ms"], 300);
        assert_eq!(out["draft"]["max_chars"], 4096);
        assert!(out["telegram"].as_object().unwrap().is_empty());
    }

    #[test]
    fn render_loaded_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[draft]
throttle_ms = 10
max_retries = 1

[channels.telegram.main]
token = "1:ABC"
edit_throttle_ms = 700
max_message_chars = 9000

[channels.telegram.broken]
silent = "loud"
"#
        )
        .unwrap();
        let config = helix_config::load_config(file.path()).unwrap();
        let out = render(&config);

        assert_eq!(out["draft"]["throttle_ms"], 50);
        let main = &out["telegram"]["main"];
        assert_eq!(main["has_token"], true);
        assert_eq!(main["draft"]["throttle_ms"], 700);
        assert_eq!(main["draft"]["max_chars"], 4096);
        assert_eq!(main["draft"]["max_retries"], 1);
        assert!(out["telegram"]["broken"]["error"].is_string());
        // The token never shows up in the rendered output.
        assert!(!out.to_string().contains("1:ABC"));
    }
}
