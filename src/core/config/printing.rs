use crate::core::config::data::Config;

impl Config {
    /// Lines shown by `config show`.
    pub fn describe(&self) -> Vec<String> {
        fn line<T: std::fmt::Display>(key: &str, value: Option<T>) -> String {
            match value {
                Some(value) => format!("  {key}: {value}"),
                None => format!("  {key}: (unset)"),
            }
        }

        vec![
            "Current configuration:".to_string(),
            line("base_url", self.base_url.as_deref()),
            line("default_model", self.default_model.as_deref()),
            line(
                "history_dir",
                self.history_dir.as_ref().map(|dir| dir.display()),
            ),
            line("connect_timeout_secs", self.connect_timeout_secs),
            line("request_timeout_secs", self.request_timeout_secs),
            line("stream_timeout_secs", self.stream_timeout_secs),
            line(
                "autosave",
                self.autosave.map(|on| if on { "on" } else { "off" }),
            ),
            line("log_level", self.log_level.as_deref()),
        ]
    }

    pub fn print_all(&self) {
        for line in self.describe() {
            println!("{line}");
        }
    }
}
