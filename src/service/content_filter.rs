//! 自由文本内容过滤
//!
//! 过滤器可插拔；默认实现是基于 Aho-Corasick 的词表过滤：
//! 命中拒绝词直接拒绝，命中屏蔽词替换成 `*`。

use aho_corasick::{AhoCorasick, MatchKind};
use tracing::warn;

use crate::error::{Result, ServerError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    Clean,
    /// 部分内容被屏蔽，附带处理后的文本
    Masked(String),
    /// 拒绝发送，附带命中的词
    Rejected(String),
}

pub trait ContentFilter: Send + Sync {
    fn filter(&self, text: &str) -> FilterOutcome;
}

/// 不做任何处理
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFilter;

impl ContentFilter for NoopFilter {
    fn filter(&self, _text: &str) -> FilterOutcome {
        FilterOutcome::Clean
    }
}

/// 词表过滤（ASCII 大小写不敏感）
pub struct WordListFilter {
    blocked_words: Vec<String>,
    blocked: Option<AhoCorasick>,
    masked: Option<AhoCorasick>,
}

impl WordListFilter {
    pub fn new(blocked_words: &[String], masked_words: &[String]) -> Result<Self> {
        let blocked_words: Vec<String> = normalize(blocked_words);
        let masked_words: Vec<String> = normalize(masked_words);
        Ok(Self {
            blocked: build_matcher(&blocked_words)?,
            masked: build_matcher(&masked_words)?,
            blocked_words,
        })
    }
}

impl ContentFilter for WordListFilter {
    fn filter(&self, text: &str) -> FilterOutcome {
        if let Some(matcher) = &self.blocked {
            if let Some(hit) = matcher.find(text) {
                let word = self
                    .blocked_words
                    .get(hit.pattern().as_usize())
                    .cloned()
                    .unwrap_or_default();
                return FilterOutcome::Rejected(word);
            }
        }

        let Some(matcher) = &self.masked else {
            return FilterOutcome::Clean;
        };

        let mut output = String::with_capacity(text.len());
        let mut last = 0;
        for hit in matcher.find_iter(text) {
            output.push_str(&text[last..hit.start()]);
            let masked_chars = text[hit.start()..hit.end()].chars().count();
            output.extend(std::iter::repeat('*').take(masked_chars));
            last = hit.end();
        }
        if last == 0 {
            return FilterOutcome::Clean;
        }
        output.push_str(&text[last..]);
        FilterOutcome::Masked(output)
    }
}

fn normalize(words: &[String]) -> Vec<String> {
    words
        .iter()
        .map(|w| w.trim().to_string())
        .filter(|w| !w.is_empty())
        .collect()
}

fn build_matcher(words: &[String]) -> Result<Option<AhoCorasick>> {
    if words.is_empty() {
        return Ok(None);
    }
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .match_kind(MatchKind::LeftmostLongest)
        .build(words)
        .map(Some)
        .map_err(|e| {
            warn!("⚠️ 构建内容过滤词表失败: {}", e);
            ServerError::Internal(format!("content filter: {}", e))
        })
}
