use crate::{
    errors::ServiceError,
    services::{
        classifier::{Classifier, ParsedQuestion},
        dispatcher::ReportDispatcher,
        narrator::Narrator,
    },
};
use metrics::{counter, histogram};
use serde::Serialize;
use std::time::Instant;
use tracing::{info, instrument};

/// A narrated answer together with the classification behind it.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    #[serde(flatten)]
    pub parsed: ParsedQuestion,
    pub answer: String,
}

/// Answers business questions: classify, run the report, narrate.
#[derive(Clone)]
pub struct Assistant {
    classifier: Classifier,
    dispatcher: ReportDispatcher,
    narrator: Narrator,
}

impl Assistant {
    pub fn new(classifier: Classifier, dispatcher: ReportDispatcher, narrator: Narrator) -> Self {
        Self {
            classifier,
            dispatcher,
            narrator,
        }
    }

    pub async fn parse(&self, question: &str) -> ParsedQuestion {
        self.classifier.classify(question).await
    }

    /// Only an unreachable store surfaces as an error.
    pub async fn answer(&self, question: &str) -> Result<String, ServiceError> {
        Ok(self.respond(question).await?.answer)
    }

    #[instrument(skip(self), fields(kind))]
    pub async fn respond(&self, question: &str) -> Result<Answer, ServiceError> {
        let start = Instant::now();
        let parsed = self.parse(question).await;
        tracing::Span::current().record("kind", parsed.kind.as_ref());

        let outcome = self.dispatcher.dispatch(parsed.kind, &parsed.filters).await?;
        let answer = self.narrator.narrate(&outcome, parsed.kind).await;

        counter!("retail_insights.questions.answered", 1, "kind" => parsed.kind.as_ref().to_string());
        histogram!("retail_insights.questions.duration", start.elapsed().as_secs_f64());
        info!(kind = %parsed.kind, "Answered question in {:?}", start.elapsed());
        Ok(Answer { parsed, answer })
    }
}
