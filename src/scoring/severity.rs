//! Label to severity mapping
//!
//! Severity is an ordinal 0-3 score derived from the predicted attack
//! label. Labels the table does not know are scored as medium risk.

use serde::{Serialize, Serializer};
use std::fmt;

/// Ordinal risk of a single row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    None = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

/// Fallback for labels missing from [`SEVERITY_TABLE`]
pub const UNKNOWN_LABEL_SEVERITY: Severity = Severity::Medium;

/// Known attack labels and their severity
const SEVERITY_TABLE: &[(&str, Severity)] = &[
    ("远程命令执行攻击", Severity::High),
    ("文件上传攻击", Severity::High),
    ("Java反序列化漏洞利用攻击", Severity::High),
    ("SQL注入攻击", Severity::Medium),
    ("文件包含攻击", Severity::Medium),
    ("目录遍历攻击", Severity::Medium),
    ("XSS跨站脚本攻击", Severity::Low),
    ("CSRF攻击", Severity::Low),
    ("正常访问", Severity::None),
];

impl Severity {
    /// Score a predicted label
    pub fn of_label(label: &str) -> Self {
        SEVERITY_TABLE
            .iter()
            .find(|(known, _)| *known == label)
            .map(|(_, severity)| *severity)
            .unwrap_or(UNKNOWN_LABEL_SEVERITY)
    }

    pub fn level(self) -> u8 {
        self as u8
    }

    /// Human-readable risk tier
    pub fn tier_name(self) -> &'static str {
        match self {
            Severity::None => "低/无风险",
            Severity::Low => "低风险",
            Severity::Medium => "中风险",
            Severity::High => "高风险",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.level())
    }
}

pub fn severity_of(label: &str) -> Severity {
    Severity::of_label(label)
}

pub fn risk_tier_name(severity: Severity) -> &'static str {
    severity.tier_name()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_labels() {
        assert_eq!(severity_of("远程命令执行攻击"), Severity::High);
        assert_eq!(severity_of("Java反序列化漏洞利用攻击"), Severity::High);
        assert_eq!(severity_of("SQL注入攻击"), Severity::Medium);
        assert_eq!(severity_of("XSS跨站脚本攻击"), Severity::Low);
        assert_eq!(severity_of("正常访问"), Severity::None);
    }

    #[test]
    fn test_unknown_label_defaults_to_medium() {
        assert_eq!(severity_of("暴力破解"), Severity::Medium);
        assert_eq!(severity_of(""), Severity::Medium);
        assert_eq!(severity_of("sql注入攻击"), UNKNOWN_LABEL_SEVERITY);
    }

    #[test]
    fn test_level_always_in_range() {
        for label in ["正常访问", "CSRF攻击", "文件包含攻击", "文件上传攻击", "???", "normal"] {
            assert!(severity_of(label).level() <= 3);
        }
    }

    #[test]
    fn test_tier_names() {
        assert_eq!(risk_tier_name(Severity::None), "低/无风险");
        assert_eq!(risk_tier_name(Severity::Low), "低风险");
        assert_eq!(risk_tier_name(Severity::Medium), "中风险");
        assert_eq!(risk_tier_name(Severity::High), "高风险");
    }

    #[test]
    fn test_ordering() {
        assert!(Severity::None < Severity::Low);
        assert!(Severity::Medium < Severity::High);
        assert_eq!(serde_json::to_string(&Severity::High).unwrap(), "3");
    }
}
