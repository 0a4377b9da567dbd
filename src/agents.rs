// 双智能体编排：先由分诊助手问询，再由建议助手基于问询结果给出后续指引。
use crate::llm::{ChatMessage, LlmClient};
use anyhow::Result;

const AGENT1_SYSTEM_PROMPT: &str = "You are Agent 1, a compassionate healthcare intake assistant. \
Ask clarifying health-related questions, summarize symptoms succinctly, and capture relevant \
medical history if appropriate.";

const AGENT2_SYSTEM_PROMPT: &str = "You are Agent 2, a healthcare assistant that suggests \
over-the-counter medicine or next steps. Provide general guidance, dosage cautions, and advise \
consulting a professional when necessary. Avoid diagnosing definitively.";

const AGENT1_TEMPERATURE: f32 = 0.3;
const AGENT2_TEMPERATURE: f32 = 0.4;

/// 一次对话轮次内依次获取两个智能体的回复。
/// Agent2 的提示词依赖 Agent1 的输出，两次调用必须串行。
pub async fn dual_agent_responses(client: &LlmClient, user_message: &str) -> Result<(String, String)> {
    let agent1_messages = [
        ChatMessage::system(AGENT1_SYSTEM_PROMPT),
        ChatMessage::user(user_message),
    ];
    let agent1_reply = client.complete(&agent1_messages, AGENT1_TEMPERATURE).await?;

    let agent2_prompt = format!("Patient said: {user_message}\nAgent1 summary: {agent1_reply}");
    let agent2_messages = [
        ChatMessage::system(AGENT2_SYSTEM_PROMPT),
        ChatMessage::user(agent2_prompt),
    ];
    let agent2_reply = client.complete(&agent2_messages, AGENT2_TEMPERATURE).await?;

    Ok((agent1_reply, agent2_reply))
}
