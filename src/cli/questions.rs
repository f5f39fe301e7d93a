use anyhow::Result;

use lifelog::config::LifelogConfig;
use lifelog::store::types::QuestionCategory;

/// Print the question catalog, marking answered questions.
pub async fn questions(
    config: &LifelogConfig,
    category: Option<QuestionCategory>,
    unanswered: bool,
) -> Result<()> {
    let app = super::open_app(config).await?;
    let state = app.state().get_state();
    let questions = app.store().questions(category).await?;

    let mut current: Option<QuestionCategory> = None;
    let mut shown = 0;
    for q in &questions {
        let answered = state.has_answered(&q.id);
        if unanswered && answered {
            continue;
        }
        if current != Some(q.category) {
            if current.is_some() {
                println!();
            }
            let done = state.progress.by_category.get(&q.category).copied().unwrap_or(0);
            println!("{} ({done} recorded)", q.category.as_str().to_uppercase());
            current = Some(q.category);
        }
        let mark = if answered { "x" } else { " " };
        println!("  [{mark}] {:<28} {}", q.id, q.prompt);
        shown += 1;
    }

    if shown == 0 {
        println!("No questions to show.");
    }
    Ok(())
}
