//! 分析编排
//!
//! - `analyze`：按时间窗口取频道消息，调用分析提示词并保存结果
//! - `trend_to_content`：从已保存分析中取一个趋势，生成内容并保存

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::info;

use super::llm_service::LlmService;
use crate::core::payload::UserContent;
use crate::core::store::Store;
use crate::domain::{
    AnalysisPeriod, AnalysisRecord, AnalysisScope, AnalyzeRequest, ContentRecord, ContentScope, Period,
    TrendInput, PLATFORM_DISCORD, TREND_TO_CONTENT_PROMPT,
};
use crate::errors::{AnalyzerError, Result};

/// 分析结果
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    /// 时间窗口内没有消息
    NoMessages,
    /// LLM 原始响应
    Completed(Value),
}

pub const NO_MESSAGES_REASON: &str = "No messages found for this period.";

#[derive(Clone)]
pub struct AnalysisService {
    store: Arc<dyn Store>,
    llm: LlmService,
}

impl AnalysisService {
    pub fn new(store: Arc<dyn Store>, llm: LlmService) -> Self {
        Self { store, llm }
    }

    pub async fn analyze(&self, req: &AnalyzeRequest) -> Result<AnalysisOutcome> {
        let period: Period = req.period.parse().map_err(AnalyzerError::ValidationError)?;
        let to = Utc::now();
        let from = period.since(to);

        let mut messages = self
            .store
            .messages_in_range(req.channel_id, from, to)
            .await
            .map_err(AnalyzerError::storage)?;
        if messages.is_empty() {
            info!(channel_id = req.channel_id, period = %req.period, "no messages to analyse");
            return Ok(AnalysisOutcome::NoMessages);
        }

        messages.sort_by_key(|m| (m.created_at_by_discord, m.id));
        let lines: Vec<String> = messages.iter().map(|m| m.prompt_line()).collect();
        info!(
            channel_id = req.channel_id,
            messages = lines.len(),
            model = %req.model_name,
            prompt = %req.prompt_key,
            "running analysis"
        );

        let result = self
            .llm
            .analyse(&req.model_name, &req.prompt_key, &UserContent::Lines(lines), None)
            .await
            .map_err(AnalyzerError::llm)?;

        let record = AnalysisRecord {
            id: uuid::Uuid::new_v4().to_string(),
            creator_id: req.creator_id,
            platform: PLATFORM_DISCORD.to_string(),
            prompt_key: req.prompt_key.clone(),
            llm_model: Some(req.model_name.clone()),
            scope: AnalysisScope {
                server_id: req.server_id,
                channel_id: req.channel_id,
            },
            period: AnalysisPeriod { from, to },
            result: result.clone(),
            created_at: Utc::now(),
        };
        let analysis_id = self
            .store
            .insert_analysis(&record)
            .await
            .map_err(AnalyzerError::llm)?;
        info!(%analysis_id, "analysis stored");

        Ok(AnalysisOutcome::Completed(result))
    }

    pub async fn trend_to_content(&self, analysis_id: &str, trend_index: usize) -> Result<Value> {
        let analysis = self
            .store
            .get_analysis(analysis_id)
            .await
            .map_err(AnalyzerError::storage)?
            .ok_or_else(|| AnalyzerError::NotFound("Analyse not found".to_string()))?;

        let parsed = analysis
            .parsed_content()
            .ok_or_else(|| AnalyzerError::Internal("Failed to parse LLM analysis content".to_string()))?;

        let trends = parsed
            .get("trends")
            .and_then(Value::as_array)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AnalyzerError::ValidationError("No trends found in the analysis result".to_string()))?;

        let trend = trends.get(trend_index).ok_or_else(|| {
            AnalyzerError::ValidationError(format!(
                "Trend index {} out of range. Only {} trend(s) available.",
                trend_index,
                trends.len()
            ))
        })?;

        let input = TrendInput::from_trend(trend, analysis.timeframe());
        let model_name = analysis
            .llm_model
            .clone()
            .ok_or_else(|| AnalyzerError::llm("analysis has no recorded model"))?;

        info!(
            %analysis_id,
            trend_index,
            model = %model_name,
            "generating content from trend"
        );

        let trend_value = serde_json::to_value(&input)?;
        let result = self
            .llm
            .trend_to_content(&model_name, TREND_TO_CONTENT_PROMPT, &trend_value, None)
            .await
            .map_err(AnalyzerError::llm)?;

        let record = ContentRecord {
            id: uuid::Uuid::new_v4().to_string(),
            creator_id: analysis.creator_id,
            platform: analysis.platform.clone(),
            source_analysis_id: analysis.id.clone(),
            prompt_key: TREND_TO_CONTENT_PROMPT.to_string(),
            llm_model: Some(model_name),
            scope: ContentScope {
                trend_id: trend_index,
                trend_title: input.trend_title.clone(),
                timeframe: input.timeframe.clone(),
            },
            input_trend: input,
            result: result.clone(),
            created_at: Utc::now(),
        };
        self.store
            .insert_content(&record)
            .await
            .map_err(AnalyzerError::llm)?;

        Ok(result)
    }
}
