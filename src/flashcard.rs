//! Flashcard deck: the answer split into the cards a study UI tabs between.

use std::fmt;

use serde::Serialize;

use crate::synthesize::SynthesizedAnswer;

/// One card: a title and its lines of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Card {
    pub title: String,
    pub lines: Vec<String>,
}

/// Answer, Facts and Questions cards, in that order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashcardDeck {
    pub cards: Vec<Card>,
}

impl From<&SynthesizedAnswer> for FlashcardDeck {
    fn from(answer: &SynthesizedAnswer) -> Self {
        let summary = if answer.summary.trim().is_empty() {
            vec!["(no summary)".to_string()]
        } else {
            answer.summary.lines().map(str::to_string).collect()
        };

        let facts = if answer.facts.is_empty() {
            vec!["(no facts)".to_string()]
        } else {
            answer.facts.iter().map(|f| format!("- {f}")).collect()
        };

        let mut questions = Vec::new();
        for (i, q) in answer.questions.iter().enumerate() {
            if i > 0 {
                questions.push(String::new());
            }
            questions.push(format!("{}. {}", i + 1, q.question));
            for (letter, option) in ('A'..='Z').zip(&q.options) {
                questions.push(format!("   {letter}) {option}"));
            }
            if !q.correct_answer.is_empty() {
                questions.push(format!("   Answer: {}", q.correct_answer));
            }
        }
        if questions.is_empty() {
            questions.push("(no questions)".to_string());
        }

        Self {
            cards: vec![
                Card {
                    title: "Answer".into(),
                    lines: summary,
                },
                Card {
                    title: "Facts".into(),
                    lines: facts,
                },
                Card {
                    title: "Questions".into(),
                    lines: questions,
                },
            ],
        }
    }
}

impl fmt::Display for FlashcardDeck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, card) in self.cards.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "== {} ==", card.title)?;
            for line in &card.lines {
                writeln!(f, "{line}")?;
            }
        }
        Ok(())
    }
}
