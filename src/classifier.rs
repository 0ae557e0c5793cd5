//! Intent Classifier
//!
//! Routes a message to one of two modules:
//! - Finance: spending, payments, salary, purchases, money
//! - Memory: notes, ideas, reflections, reminders
//!
//! Exactly one policy is active per process. Anything ambiguous lands in
//! memory.

use crate::gemini::{CompletionRequest, CompletionService};
use crate::models::Domain;
use crate::normalize::fold_accents;
use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Below this confidence a finance verdict is downgraded to memory.
pub const MIN_FINANCE_CONFIDENCE: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub domain: Domain,
    pub confidence: f32,
}

impl Classification {
    fn defaulted() -> Self {
        Self {
            domain: Domain::Memory,
            confidence: 0.0,
        }
    }

    /// Apply the low-confidence rule.
    fn settle(domain: Domain, confidence: f32) -> Self {
        let confidence = confidence.clamp(0.0, 1.0);
        if domain == Domain::Finance && confidence < MIN_FINANCE_CONFIDENCE {
            return Self::defaulted();
        }
        Self { domain, confidence }
    }
}

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Never fails; degrades to memory instead.
    async fn classify(&self, text: &str) -> Classification;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierPolicy {
    Model,
    Lexical,
}

impl FromStr for ClassifierPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "model" | "llm" => Ok(ClassifierPolicy::Model),
            "lexical" | "keywords" => Ok(ClassifierPolicy::Lexical),
            other => Err(format!("unknown classifier policy '{}'", other)),
        }
    }
}

/// Build the single active classifier. The model policy needs a completion client.
pub fn build_classifier(
    policy: ClassifierPolicy,
    completion: Option<Arc<dyn CompletionService>>,
) -> Box<dyn IntentClassifier> {
    match (policy, completion) {
        (ClassifierPolicy::Model, Some(client)) => Box::new(ModelClassifier::new(client)),
        (ClassifierPolicy::Model, None) => {
            warn!("Model classifier requested without a completion client, using lexical cues");
            Box::new(LexicalClassifier)
        }
        (ClassifierPolicy::Lexical, _) => Box::new(LexicalClassifier),
    }
}

//
// ================= Lexical policy =================
//

/// Static keyword lists (matched against lower-cased, accent-folded text)
const FINANCE_KEYWORDS: &[&str] = &[
    // Currency
    "r$", "reais", "dinheiro",
    // Spending
    "gastei", "gasto", "paguei", "comprei", "compra de", "boleto", "fatura",
    // Earning
    "recebi", "salario", "ganhei", "vendi", "deposit",
    // Payment rails
    "pix", "credito", "debito", "cartao", "transferi", "parcel",
];

const MEMORY_KEYWORDS: &[&str] = &[
    "lembrete", "lembrar", "me lembre", "ideia", "reflexao", "nota", "anotar", "pensei",
];

/// Deterministic cue counting, usable without any external service.
pub struct LexicalClassifier;

impl LexicalClassifier {
    pub fn classify_text(text: &str) -> Classification {
        let folded = fold_accents(&text.to_lowercase());

        let mut finance_score = FINANCE_KEYWORDS
            .iter()
            .filter(|kw| folded.contains(**kw))
            .count();

        if contains_money_amount(&folded) {
            finance_score += 1;
        }
        if contains_installment_marker(&folded) {
            finance_score += 1;
        }

        let memory_score = MEMORY_KEYWORDS
            .iter()
            .filter(|kw| folded.contains(**kw))
            .count();

        if finance_score > memory_score {
            let margin = (finance_score - memory_score) as f32;
            Classification::settle(Domain::Finance, (0.5 + 0.15 * margin).min(0.95))
        } else if memory_score > 0 {
            Classification::settle(Domain::Memory, 0.9)
        } else {
            Classification::settle(Domain::Memory, 0.5)
        }
    }
}

#[async_trait]
impl IntentClassifier for LexicalClassifier {
    async fn classify(&self, text: &str) -> Classification {
        Self::classify_text(text)
    }
}

/// "45,90", "3.000,00", "12.5" style values
fn contains_money_amount(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    chars.windows(4).any(|w| {
        w[0].is_ascii_digit()
            && (w[1] == ',' || w[1] == '.')
            && w[2].is_ascii_digit()
            && w[3].is_ascii_digit()
    })
}

/// "6x", "em 12x", "10 vezes"
fn contains_installment_marker(text: &str) -> bool {
    text.split(|c: char| c.is_whitespace() || c == ',' || c == '.')
        .any(|token| {
            token.len() > 1
                && token.ends_with('x')
                && token[..token.len() - 1].chars().all(|c| c.is_ascii_digit())
        })
        || text.contains(" vezes")
}

//
// ================= Model policy =================
//

const CLASSIFIER_PROMPT: &str = r#"You are an intent classifier for a personal assistant that receives Brazilian Portuguese messages.

Classify the user message into exactly ONE of:

- memory -> notes, ideas, reflections, reminders
- finance -> spending, payments, salaries, purchases, money

Reply with ONLY one of these words:
memory
finance"#;

/// Classifier backed by the completion service
pub struct ModelClassifier {
    client: Arc<dyn CompletionService>,
}

impl ModelClassifier {
    pub fn new(client: Arc<dyn CompletionService>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IntentClassifier for ModelClassifier {
    async fn classify(&self, text: &str) -> Classification {
        let request = CompletionRequest {
            system_instruction: CLASSIFIER_PROMPT,
            user_text: text,
            temperature: 0.0,
        };

        let completion = match self.client.complete(request).await {
            Ok(completion) => completion,
            Err(e) => {
                warn!(error = %e, "Intent classification failed, defaulting to memory");
                return Classification::defaulted();
            }
        };

        let label = completion
            .text
            .trim()
            .trim_matches(|c: char| !c.is_alphabetic())
            .to_lowercase();

        let domain = match label.as_str() {
            "finance" => Domain::Finance,
            "memory" => Domain::Memory,
            other => {
                warn!(label = %other, "Unexpected classifier label, defaulting to memory");
                return Classification::defaulted();
            }
        };

        let classification = Classification::settle(domain, completion.confidence());
        debug!(
            domain = %classification.domain,
            confidence = classification.confidence,
            "Message classified"
        );
        classification
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedCompletion;

    #[test]
    fn test_finance_messages() {
        let cases = vec![
            "Gastei 45,90 no almoço hoje",
            "Comprei um notebook por 3000 em 6x",
            "Recebi meu salário",
            "paguei 120 reais de luz no pix",
        ];

        for c in cases {
            assert_eq!(
                LexicalClassifier::classify_text(c).domain,
                Domain::Finance,
                "{}",
                c
            );
        }
    }

    #[test]
    fn test_memory_messages() {
        let cases = vec![
            "Lembrete pagar cartão amanhã às 10",
            "Ideia criar um assistente pessoal com IA",
            "Reflexão estou rendendo melhor de manhã",
            "comprar pão",
        ];

        for c in cases {
            assert_eq!(
                LexicalClassifier::classify_text(c).domain,
                Domain::Memory,
                "{}",
                c
            );
        }
    }

    #[test]
    fn test_edge_cases() {
        let empty = LexicalClassifier::classify_text("");
        assert_eq!(empty.domain, Domain::Memory);

        let unclear = LexicalClassifier::classify_text("hmm");
        assert_eq!(unclear.domain, Domain::Memory);
        assert!(unclear.confidence <= 0.5);
    }

    #[test]
    fn test_low_confidence_finance_downgrades() {
        let settled = Classification::settle(Domain::Finance, 0.3);
        assert_eq!(settled.domain, Domain::Memory);
    }

    #[tokio::test]
    async fn test_model_classifier_reads_label() {
        let client = Arc::new(ScriptedCompletion::replying(&["Finance\n"]));
        let classifier = ModelClassifier::new(client);

        let result = classifier.classify("Gastei 45,90 no almoço hoje").await;
        assert_eq!(result.domain, Domain::Finance);
        assert!(result.confidence >= MIN_FINANCE_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_model_classifier_defaults_to_memory() {
        let garbage = Arc::new(ScriptedCompletion::replying(&["I think this is about money"]));
        let result = ModelClassifier::new(garbage).classify("x").await;
        assert_eq!(result.domain, Domain::Memory);

        let failing = Arc::new(ScriptedCompletion::failing());
        let result = ModelClassifier::new(failing).classify("x").await;
        assert_eq!(result.domain, Domain::Memory);

        let unsure = Arc::new(ScriptedCompletion::replying_with_finish(&["finance"], "SAFETY"));
        let result = ModelClassifier::new(unsure).classify("x").await;
        assert_eq!(result.domain, Domain::Memory);
    }

    #[tokio::test]
    async fn test_single_policy_is_built() {
        let lexical = build_classifier(ClassifierPolicy::Lexical, None);
        let result = lexical.classify("Gastei 45,90 no almoço hoje").await;
        assert_eq!(result.domain, Domain::Finance);

        // Model requested without a client degrades to the lexical policy.
        let degraded = build_classifier(ClassifierPolicy::Model, None);
        let result = degraded.classify("Ideia criar um app").await;
        assert_eq!(result.domain, Domain::Memory);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("model".parse::<ClassifierPolicy>().unwrap(), ClassifierPolicy::Model);
        assert_eq!(" Lexical ".parse::<ClassifierPolicy>().unwrap(), ClassifierPolicy::Lexical);
        assert!("coinflip".parse::<ClassifierPolicy>().is_err());
    }
}
