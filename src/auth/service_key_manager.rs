use std::collections::HashSet;

/// 管理端 Service Key 白名单
///
/// 白名单为空时拒绝所有请求。
pub struct ServiceKeyManager {
    keys: HashSet<String>,
}

impl ServiceKeyManager {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys
                .into_iter()
                .map(Into::into)
                .filter(|k: &String| !k.trim().is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// 验证 service key
    pub fn verify(&self, key: &str) -> bool {
        // 遍历全部 key，不提前返回
        self.keys
            .iter()
            .fold(false, |found, k| constant_time_compare(key.as_bytes(), k.as_bytes()) | found)
    }
}

/// 恒定时间字符串比较，防止时序攻击
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitelist() {
        let manager = ServiceKeyManager::new(["key1", "key2"]);
        assert!(manager.verify("key1"));
        assert!(manager.verify("key2"));
        assert!(!manager.verify("key3"));
    }

    #[test]
    fn test_empty_whitelist_rejects_everything() {
        let manager = ServiceKeyManager::new(Vec::<String>::new());
        assert!(manager.is_empty());
        assert!(!manager.verify(""));
        assert!(!manager.verify("anything"));

        let blank = ServiceKeyManager::new([" "]);
        assert!(blank.is_empty());
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(b"hello", b"hello"));
        assert!(!constant_time_compare(b"hello", b"world"));
        assert!(!constant_time_compare(b"short", b"verylongstring"));
    }
}
