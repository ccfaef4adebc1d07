//! 沟通阶段与能力

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 沟通阶段
///
/// 正常情况下随广告观看数单调推进：`PresetOnly -> CustomText -> VoiceEnabled`，
/// 但管理员覆盖可以把“生效阶段”设为三者中任意一个。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommunicationStage {
    /// 只能使用预设快捷消息
    PresetOnly,
    /// 可发送自定义文字
    CustomText,
    /// 可使用语音
    VoiceEnabled,
}

impl CommunicationStage {
    pub const ALL: [CommunicationStage; 3] = [
        CommunicationStage::PresetOnly,
        CommunicationStage::CustomText,
        CommunicationStage::VoiceEnabled,
    ];

    /// 数据库/接口中使用的字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            CommunicationStage::PresetOnly => "PRESET_ONLY",
            CommunicationStage::CustomText => "CUSTOM_TEXT",
            CommunicationStage::VoiceEnabled => "VOICE_ENABLED",
        }
    }

    /// 该阶段是否允许某项能力
    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            // 预设/快捷聊天永远不受广告数限制，只受关系与审核限制
            Capability::PresetQuickChat => true,
            Capability::CustomTextChat => matches!(
                self,
                CommunicationStage::CustomText | CommunicationStage::VoiceEnabled
            ),
            Capability::VoiceChat => matches!(self, CommunicationStage::VoiceEnabled),
        }
    }
}

impl fmt::Display for CommunicationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 无法识别的阶段字符串
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown communication stage: {0}")]
pub struct UnknownStage(pub String);

impl FromStr for CommunicationStage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "PRESET_ONLY" => Ok(CommunicationStage::PresetOnly),
            "CUSTOM_TEXT" => Ok(CommunicationStage::CustomText),
            "VOICE_ENABLED" => Ok(CommunicationStage::VoiceEnabled),
            other => Err(UnknownStage(other.to_string())),
        }
    }
}

/// 渠道请求的能力
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    PresetQuickChat,
    CustomTextChat,
    VoiceChat,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::PresetQuickChat => "preset_quick_chat",
            Capability::CustomTextChat => "custom_text_chat",
            Capability::VoiceChat => "voice_chat",
        }
    }
}
