// ==========================================
// 国际化 (i18n) 模块
// ==========================================
// 使用 rust-i18n 库，支持中文（默认）和英文
// Labels 在运行开始时按配置语言构造一次，按引用传递
// 注意: rust_i18n::i18n! 宏已在 lib.rs 中初始化
// ==========================================

/// 用户可见消息的查找表（固定语言）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labels {
    locale: String,
}

impl Labels {
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// 翻译消息（无参数）
    pub fn get(&self, key: &str) -> String {
        rust_i18n::t!(key, locale = self.locale.as_str()).to_string()
    }

    /// 翻译消息（带参数，替换 %{name} 占位符）
    ///
    /// # 示例
    /// ```no_run
    /// use catalog_import::i18n::Labels;
    /// let labels = Labels::new("en");
    /// let msg = labels.format("import.file_not_found", &[("path", "/tmp/test.csv")]);
    /// ```
    pub fn format(&self, key: &str, args: &[(&str, &str)]) -> String {
        let mut result = self.get(key);
        for (k, v) in args {
            let placeholder = format!("%{{{}}}", k);
            result = result.replace(&placeholder, v);
        }
        result
    }
}

impl Default for Labels {
    fn default() -> Self {
        Self::new("zh-CN")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_locale_scoped() {
        let zh = Labels::new("zh-CN");
        let en = Labels::new("en");

        assert_eq!(zh.get("import.finished"), "导入完成");
        assert_eq!(en.get("import.finished"), "Import finished");
    }

    #[test]
    fn test_format_with_args() {
        let en = Labels::new("en");
        let msg = en.format("import.file_not_found", &[("path", "/tmp/test.csv")]);
        assert_eq!(msg, "Import file not found: /tmp/test.csv");

        let zh = Labels::default();
        let msg = zh.format("import.max_failures", &[("count", "12")]);
        assert!(msg.contains("12"));
    }
}
