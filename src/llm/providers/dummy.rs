//! Dummy generator — echoes the topic back prefixed with `[echo]`.
//! Lets the bot run end to end without GigaChat credentials.

use crate::llm::GenerationResult;

#[derive(Debug, Clone)]
pub struct DummyGenerator;

impl DummyGenerator {
    pub async fn generate(&self, topic: &str) -> GenerationResult {
        Ok(format!("[echo] {topic}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn generate_prefixes_echo() {
        assert_eq!(DummyGenerator.generate("hello").await.unwrap(), "[echo] hello");
    }

    #[tokio::test]
    async fn generate_empty_topic() {
        assert_eq!(DummyGenerator.generate("").await.unwrap(), "[echo] ");
    }
}
