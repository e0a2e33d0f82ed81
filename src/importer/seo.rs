// ==========================================
// 批量导入引擎 - SEO 名称工具
// ==========================================
// 职责: 文本 → URL slug（小写、变音字母转写、'-' 分隔）
// ==========================================

/// slug 最大长度（字符）
pub const MAX_SLUG_LENGTH: usize = 400;

/// 将任意文本转换为 URL slug
///
/// # 规则
/// - 德语变音字母转写（ä → ae, ß → ss），常见带音标拉丁字母去音标
/// - 字母数字保留并转小写，其余可见字符视为分隔符，连续分隔符合并为一个 '-'
/// - 无法转写的非拉丁字符丢弃
/// - 结果最长 MAX_SLUG_LENGTH，首尾不含 '-'
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for ch in input.chars() {
        let lower = ch.to_lowercase().next().unwrap_or(ch);

        let mapped: Option<&str> = match lower {
            'ä' => Some("ae"),
            'ö' => Some("oe"),
            'ü' => Some("ue"),
            'ß' => Some("ss"),
            'à' | 'á' | 'â' | 'ã' | 'å' => Some("a"),
            'æ' => Some("ae"),
            'ç' => Some("c"),
            'è' | 'é' | 'ê' | 'ë' => Some("e"),
            'ì' | 'í' | 'î' | 'ï' => Some("i"),
            'ñ' => Some("n"),
            'ò' | 'ó' | 'ô' | 'õ' | 'ø' => Some("o"),
            'œ' => Some("oe"),
            'ù' | 'ú' | 'û' => Some("u"),
            'ý' | 'ÿ' => Some("y"),
            _ => None,
        };

        if let Some(text) = mapped {
            push_part(&mut slug, text, &mut pending_dash);
        } else if lower.is_ascii_alphanumeric() {
            let mut buf = [0u8; 4];
            push_part(&mut slug, lower.encode_utf8(&mut buf), &mut pending_dash);
        } else if lower.is_ascii() || lower.is_whitespace() {
            pending_dash = !slug.is_empty();
        }
    }

    if slug.chars().count() > MAX_SLUG_LENGTH {
        slug = slug.chars().take(MAX_SLUG_LENGTH).collect();
    }
    slug.trim_end_matches('-').to_string()
}

fn push_part(slug: &mut String, part: &str, pending_dash: &mut bool) {
    if *pending_dash {
        slug.push('-');
        *pending_dash = false;
    }
    slug.push_str(part);
}

/// 确定实体的 slug 候选
///
/// 显式 SEO 名称优先，为空或转换后为空时回退到显示名称。
/// 两者都无法生成 slug 时返回 None。
pub fn validate_se_name(se_name: Option<&str>, display_name: &str) -> Option<String> {
    se_name
        .map(slugify)
        .filter(|s| !s.is_empty())
        .or_else(|| Some(slugify(display_name)).filter(|s| !s.is_empty()))
}

/// 生成第 n 个去重候选：slug-2、slug-3 ...
pub fn with_suffix(slug: &str, n: usize) -> String {
    let suffix = format!("-{}", n);
    let max_base = MAX_SLUG_LENGTH.saturating_sub(suffix.len());
    let base: String = slug.chars().take(max_base).collect();
    format!("{}{}", base.trim_end_matches('-'), suffix)
}
