use uuid::Uuid;

use super::session_manager::{ConversationState, SessionData};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Greeting,
    PaymentStatus,
    Refund,
    PaymentMethods,
    Help,
    Affirm,
    Deny,
    Reset,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::PaymentStatus => "payment_status",
            Intent::Refund => "refund",
            Intent::PaymentMethods => "payment_methods",
            Intent::Help => "help",
            Intent::Affirm => "affirm",
            Intent::Deny => "deny",
            Intent::Reset => "reset",
            Intent::Unknown => "unknown",
        }
    }
}

const RESET_WORDS: &[&str] = &["reset", "cancel", "restart"];
const REFUND_WORDS: &[&str] = &["refund", "refunds", "chargeback", "reimburse"];
const STATUS_WORDS: &[&str] = &["status", "track", "pending", "processed", "went"];
const METHOD_WORDS: &[&str] = &["method", "methods", "card", "cards", "paypal", "wallet", "transfer"];
const HELP_WORDS: &[&str] = &["help", "support", "assist"];
const GREETING_WORDS: &[&str] = &["hello", "hi", "hey", "greetings"];
const AFFIRM_WORDS: &[&str] = &["yes", "y", "yeah", "yep", "sure", "confirm", "ok", "okay"];
const DENY_WORDS: &[&str] = &["no", "n", "nope", "nah"];

const HELP_TEXT: &str = "I can check the status of a payment, start a refund, or tell you which payment methods we accept.";
const METHODS_TEXT: &str = "We accept Visa, Mastercard, American Express, PayPal and bank transfers.";
const TXN_EXAMPLE: &str = "e.g. TXN123456";

fn words(msg: &str) -> Vec<String> {
    msg.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn mentions(words: &[String], vocabulary: &[&str]) -> bool {
    words.iter().any(|w| vocabulary.contains(&w.as_str()))
}

pub fn detect_intent(msg: &str) -> Intent {
    let msg_lower = msg.to_lowercase();
    let words = words(msg);

    if mentions(&words, RESET_WORDS) || msg_lower.contains("start over") {
        Intent::Reset
    } else if mentions(&words, REFUND_WORDS) || msg_lower.contains("money back") {
        Intent::Refund
    } else if mentions(&words, STATUS_WORDS) || msg_lower.contains("where is my payment") {
        Intent::PaymentStatus
    } else if mentions(&words, METHOD_WORDS) || msg_lower.contains("pay with") {
        Intent::PaymentMethods
    } else if mentions(&words, HELP_WORDS) {
        Intent::Help
    } else if mentions(&words, GREETING_WORDS) || msg_lower.contains("good morning") {
        Intent::Greeting
    } else if mentions(&words, AFFIRM_WORDS) {
        Intent::Affirm
    } else if mentions(&words, DENY_WORDS) {
        Intent::Deny
    } else {
        Intent::Unknown
    }
}

/// 6 to 24 characters of letters, digits or dashes, with at least one digit.
pub fn is_valid_transaction_id(candidate: &str) -> bool {
    let len = candidate.chars().count();
    (6..=24).contains(&len)
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        && candidate.chars().any(|c| c.is_ascii_digit())
}

/// First token in `msg` that looks like a transaction id, upper-cased.
pub fn extract_transaction_id(msg: &str) -> Option<String> {
    msg.split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
        .find(|token| is_valid_transaction_id(token))
        .map(str::to_uppercase)
}

#[derive(Debug, Clone)]
pub struct BotReply {
    pub text: String,
    pub intent: Intent,
    pub state: ConversationState,
    pub data: SessionData,
}

impl BotReply {
    fn new(text: impl Into<String>, intent: Intent, state: ConversationState, data: SessionData) -> Self {
        Self {
            text: text.into(),
            intent,
            state,
            data,
        }
    }
}

fn pending_question(state: &ConversationState) -> Option<String> {
    match state {
        ConversationState::Idle => None,
        ConversationState::AskingTransactionForStatus
        | ConversationState::AskingTransactionForRefund => Some(format!(
            "Could you share the transaction ID ({})?",
            TXN_EXAMPLE
        )),
        ConversationState::AskingRefundReason => {
            Some("Could you tell me why you'd like a refund?".to_string())
        }
        ConversationState::ConfirmingRefund => {
            Some("Shall I submit the refund request? (yes/no)".to_string())
        }
    }
}

fn status_answer(transaction_id: &str) -> String {
    format!(
        "I've looked up {}: it is currently being processed. Payments usually settle within 1-3 business days.",
        transaction_id
    )
}

fn refund_reference() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("RF-{}", id[..8].to_uppercase())
}

/// Advance the conversation by one user message.
pub fn generate_reply(state: &ConversationState, user_msg: &str, data: SessionData) -> BotReply {
    use ConversationState::*;

    let intent = detect_intent(user_msg);

    // A refund reason is free text, so only a bare command resets it.
    let reset = match state {
        AskingRefundReason => is_reset_command(user_msg),
        _ => intent == Intent::Reset,
    };
    if reset {
        return BotReply::new(
            "No problem, I've reset our conversation. How can I help you with your payment?",
            Intent::Reset,
            Idle,
            SessionData::default(),
        );
    }

    // A yes/no answer settles the confirmation whatever else the message mentions.
    if *state == ConfirmingRefund {
        if let Some(answer) = confirmation_answer(user_msg) {
            return confirm_refund(answer, data);
        }
    }

    // Side questions mid-flow are answered without losing our place. Free-text
    // refund reasons and messages carrying an id are never treated as side questions.
    let side_question = matches!(intent, Intent::Help | Intent::PaymentMethods)
        && !matches!(state, Idle | AskingRefundReason)
        && extract_transaction_id(user_msg).is_none();
    if side_question {
        let answer = if intent == Intent::Help { HELP_TEXT } else { METHODS_TEXT };
        let reminder = pending_question(state).unwrap_or_default();
        return BotReply::new(format!("{} {}", answer, reminder), intent, state.clone(), data);
    }

    match state {
        Idle => idle_reply(intent, user_msg, data),

        AskingTransactionForStatus => match extract_transaction_id(user_msg) {
            Some(txn) => BotReply::new(status_answer(&txn), Intent::PaymentStatus, Idle, SessionData::default()),
            None => BotReply::new(
                format!("That doesn't look like a transaction ID. Please try again ({}).", TXN_EXAMPLE),
                intent,
                state.clone(),
                data,
            ),
        },

        AskingTransactionForRefund => match extract_transaction_id(user_msg) {
            Some(txn) => BotReply::new(
                format!("Thanks. Why would you like a refund for {}?", txn),
                Intent::Refund,
                AskingRefundReason,
                SessionData {
                    transaction_id: Some(txn),
                    ..data
                },
            ),
            None => BotReply::new(
                format!("That doesn't look like a transaction ID. Please try again ({}).", TXN_EXAMPLE),
                intent,
                state.clone(),
                data,
            ),
        },

        AskingRefundReason => {
            let reason = user_msg.trim().to_string();
            let txn = data.transaction_id.clone().unwrap_or_default();
            BotReply::new(
                format!(
                    "To confirm: refund {} because \"{}\". Shall I submit the refund request? (yes/no)",
                    txn, reason
                ),
                Intent::Refund,
                ConfirmingRefund,
                SessionData {
                    refund_reason: Some(reason),
                    ..data
                },
            )
        }

        ConfirmingRefund => BotReply::new("Please answer yes or no.", intent, state.clone(), data),
    }
}

/// Whole-message reset command, ignoring surrounding punctuation.
pub fn is_reset_command(msg: &str) -> bool {
    let command = msg
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    RESET_WORDS.contains(&command.as_str()) || command == "start over"
}

fn confirmation_answer(msg: &str) -> Option<Intent> {
    let words = words(msg);
    match (mentions(&words, AFFIRM_WORDS), mentions(&words, DENY_WORDS)) {
        (true, false) => Some(Intent::Affirm),
        (false, true) => Some(Intent::Deny),
        _ => None,
    }
}

fn confirm_refund(answer: Intent, data: SessionData) -> BotReply {
    if answer != Intent::Affirm {
        return BotReply::new(
            "Okay, I won't submit the refund. Anything else I can help with?",
            answer,
            ConversationState::Idle,
            SessionData::default(),
        );
    }

    let txn = data.transaction_id.unwrap_or_default();
    BotReply::new(
        format!(
            "Your refund request for {} has been submitted. Reference: {}. Funds usually return within 5-10 business days.",
            txn,
            refund_reference()
        ),
        answer,
        ConversationState::Idle,
        SessionData::default(),
    )
}

fn idle_reply(intent: Intent, user_msg: &str, data: SessionData) -> BotReply {
    use ConversationState::*;

    match intent {
        Intent::Greeting => BotReply::new(
            format!("Hello! {}", HELP_TEXT),
            intent,
            Idle,
            data,
        ),

        Intent::PaymentStatus => match extract_transaction_id(user_msg) {
            Some(txn) => BotReply::new(status_answer(&txn), intent, Idle, data),
            None => BotReply::new(
                format!("Sure, I can check that. What is the transaction ID ({})?", TXN_EXAMPLE),
                intent,
                AskingTransactionForStatus,
                data,
            ),
        },

        Intent::Refund => match extract_transaction_id(user_msg) {
            Some(txn) => BotReply::new(
                format!("I can help with that. Why would you like a refund for {}?", txn),
                intent,
                AskingRefundReason,
                SessionData {
                    transaction_id: Some(txn),
                    ..data
                },
            ),
            None => BotReply::new(
                format!("I can help with a refund. What is the transaction ID ({})?", TXN_EXAMPLE),
                intent,
                AskingTransactionForRefund,
                data,
            ),
        },

        Intent::PaymentMethods => BotReply::new(METHODS_TEXT, intent, Idle, data),

        Intent::Help => BotReply::new(HELP_TEXT, intent, Idle, data),

        Intent::Affirm | Intent::Deny | Intent::Unknown | Intent::Reset => BotReply::new(
            format!("I didn't quite catch that. {}", HELP_TEXT),
            intent,
            Idle,
            data,
        ),
    }
}
