//! Article authoring: model-drafted plans, quality issues and the client-side
//! enhancer flow.

mod author;
pub mod issues;
pub mod plan;

pub use author::{ArticleAuthor, ArticleSummary, DescriptionSource, DescriptionSummary};
pub use plan::{parse_article_plan, ArticlePlan, PlanStep};
