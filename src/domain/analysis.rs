//! 分析结果领域实体

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::Snowflake;

/// 分析平台标识
pub const PLATFORM_DISCORD: &str = "discord";

/// 趋势转内容使用的提示词
pub const TREND_TO_CONTENT_PROMPT: &str = "trend_to_content";

/// 分析时间窗口
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    LastDay,
    LastWeek,
    LastMonth,
}

impl Period {
    /// 窗口起点，`last_month` 按日历月回退
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Period::LastDay => now - Duration::days(1),
            Period::LastWeek => now - Duration::weeks(1),
            Period::LastMonth => now
                .checked_sub_months(Months::new(1))
                .unwrap_or(now - Duration::days(30)),
        }
    }
}

impl std::str::FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last_day" => Ok(Period::LastDay),
            "last_week" => Ok(Period::LastWeek),
            "last_month" => Ok(Period::LastMonth),
            _ => Err("Invalid period. Use last_day, last_week, or last_month.".to_string()),
        }
    }
}

/// 分析请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    /// 内部用户 ID（必填）
    pub creator_id: i64,
    #[serde(rename = "serverId", with = "super::message::snowflake_str")]
    pub server_id: Snowflake,
    #[serde(rename = "channelId", with = "super::message::snowflake_str")]
    pub channel_id: Snowflake,
    pub model_name: String,
    pub prompt_key: String,
    /// last_day | last_week | last_month
    pub period: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisScope {
    pub server_id: Snowflake,
    pub channel_id: Snowflake,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPeriod {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// `analysis_results` 文档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: String,
    pub creator_id: i64,
    pub platform: String,
    pub prompt_key: String,
    pub llm_model: Option<String>,
    pub scope: AnalysisScope,
    pub period: AnalysisPeriod,
    /// LLM 原始响应
    pub result: Value,
    pub created_at: DateTime<Utc>,
}

impl AnalysisRecord {
    /// 取出 `result.choices[0].message.content` 并解析为 JSON
    pub fn parsed_content(&self) -> Option<Value> {
        let raw = self
            .result
            .get("choices")?
            .get(0)?
            .get("message")?
            .get("content")?
            .as_str()?;
        serde_json::from_str(raw).ok()
    }

    /// 原始响应中的 `timeframe` 字段，没有时为 null
    pub fn timeframe(&self) -> Value {
        self.result.get("timeframe").cloned().unwrap_or(Value::Null)
    }
}

/// 送入内容生成提示词的趋势
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendInput {
    pub trend_title: Value,
    pub summary: Value,
    pub representative_messages: Value,
    pub activity_level: Value,
    pub timeframe: Value,
}

impl TrendInput {
    pub fn from_trend(trend: &Value, timeframe: Value) -> Self {
        let field = |key: &str| trend.get(key).cloned().unwrap_or(Value::Null);
        Self {
            trend_title: field("title"),
            summary: field("summary"),
            representative_messages: trend
                .get("representative_messages")
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new())),
            activity_level: field("activity_level"),
            timeframe,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentScope {
    pub trend_id: usize,
    pub trend_title: Value,
    pub timeframe: Value,
}

/// `summary_results` 文档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: String,
    pub creator_id: i64,
    pub platform: String,
    pub source_analysis_id: String,
    pub prompt_key: String,
    pub llm_model: Option<String>,
    pub scope: ContentScope,
    pub input_trend: TrendInput,
    pub result: Value,
    pub created_at: DateTime<Utc>,
}
