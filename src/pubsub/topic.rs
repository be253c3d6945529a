use crate::error::{BrokerError, BrokerResult};

/// Префикс тем личных сообщений.
pub const DEFAULT_CHAT_TOPIC_PREFIX: &str = "users.chat.";

/// Собирает тему чата для получателя: `<prefix><identifier>`.
pub fn chat_topic(
    prefix: &str,
    identifier: &str,
) -> String {
    format!("{prefix}{identifier}")
}

/// Проверяет имя темы.
///
/// Тема - непустая последовательность токенов через `.`; токены не пустые,
/// без пробельных символов и без символов шаблонов `*` и `>`.
pub fn validate_topic(topic: &str) -> BrokerResult<()> {
    let valid = !topic.is_empty()
        && topic.split('.').all(|token| {
            !token.is_empty()
                && !token
                    .chars()
                    .any(|c| c.is_whitespace() || c == '*' || c == '>')
        });

    if valid {
        Ok(())
    } else {
        Err(BrokerError::InvalidTopic(topic.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_topic() {
        assert_eq!(
            chat_topic(DEFAULT_CHAT_TOPIC_PREFIX, "alice@example.com"),
            "users.chat.alice@example.com"
        );
    }

    #[test]
    fn test_validate_topic() {
        for ok in ["users.chat.alice", "a", "users.chat.a-b_c@d.com"] {
            assert!(validate_topic(ok).is_ok(), "{ok} must be valid");
        }
        for bad in ["", "users..chat", "users.chat.", ".users", "a b", "users.*", "users.>"] {
            assert_eq!(
                validate_topic(bad),
                Err(BrokerError::InvalidTopic(bad.to_string())),
                "{bad:?} must be rejected"
            );
        }
    }
}
