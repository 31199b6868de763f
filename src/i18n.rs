/// Localized strings for the terminal front end.
/// Selected with `--locale` (e.g. `--locale zh`).

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Zh,
}

impl Locale {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "zh" | "zh-cn" | "zh_cn" | "zh-hans" | "zh-tw" | "zh_tw" => Self::Zh,
            _ => Self::En,
        }
    }
}

pub struct Messages {
    pub package_started: &'static str,
    pub package_done: &'static str,
    pub package_failed: &'static str,
    pub summary_header: &'static str,
    pub items_label: &'static str,
    pub item_done: &'static str,
    pub error_prefix: &'static str,
}

pub static EN: Messages = Messages {
    package_started: "Package started",
    package_done: "Package installed",
    package_failed: "Package failed",
    summary_header: "Summary",
    items_label: "items",
    item_done: "done",
    error_prefix: "ERR",
};

pub static ZH: Messages = Messages {
    package_started: "表情包开始下载",
    package_done: "表情包已安装",
    package_failed: "表情包下载失败",
    summary_header: "摘要",
    items_label: "项",
    item_done: "完成",
    error_prefix: "错误",
};

pub fn get_messages(locale: Locale) -> &'static Messages {
    match locale {
        Locale::En => &EN,
        Locale::Zh => &ZH,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chinese_variants() {
        assert_eq!(Locale::parse("zh-CN"), Locale::Zh);
        assert_eq!(Locale::parse("zh_tw"), Locale::Zh);
        assert_eq!(Locale::parse("fr"), Locale::En);
    }

    #[test]
    fn picks_matching_table() {
        assert_eq!(get_messages(Locale::Zh).summary_header, "摘要");
        assert_eq!(get_messages(Locale::default()).summary_header, "Summary");
    }
}
