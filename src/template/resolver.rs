use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;

/// 占位符名称 → 替换值
pub type VariableMap = HashMap<String, String>;

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    // 常量模式，编译失败只可能是代码错误，由单元测试覆盖
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("placeholder pattern is valid"))
}

/// 将文本中的 `{key}` 替换为变量值；找不到的占位符原样保留
pub fn resolve(text: &str, vars: &VariableMap) -> String {
    placeholder()
        .replace_all(text, |caps: &Captures| match vars.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> VariableMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_missing_key_passes_through() {
        assert_eq!(resolve("Hello {missing}", &VariableMap::new()), "Hello {missing}");
    }

    #[test]
    fn test_substitutes_each_key() {
        let v = vars(&[("a", "X"), ("b", "Y")]);
        assert_eq!(resolve("{a}-{b}", &v), "X-Y");
    }

    #[test]
    fn test_repeated_key() {
        assert_eq!(resolve("{a}{a}", &vars(&[("a", "Z")])), "ZZ");
        assert_eq!(resolve("{x} and {x}", &VariableMap::new()), "{x} and {x}");
    }

    #[test]
    fn test_plain_text_and_empty() {
        let v = vars(&[("a", "X")]);
        assert_eq!(resolve("", &v), "");
        assert_eq!(resolve("no placeholders here", &v), "no placeholders here");
    }

    #[test]
    fn test_non_word_keys_are_ignored() {
        let v = vars(&[("a", "X"), ("a b", "nope")]);
        assert_eq!(resolve("{a b} {a-b} {{a}}", &v), "{a b} {a-b} {X}");
    }
}
