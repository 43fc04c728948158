use std::sync::Arc;

use mailflow::{
    CompanyScope, Config, MemWorkflowApi, NewWorkflow, WorkflowApi,
    workflow::{ActionDraft, ActionKind, ActionPayload, Branch, ConditionPayload, Criterion, EmailPayload, WaitPayload, WorkflowEditor},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> mailflow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Config::load_from_str(include_str!("./config.toml"))?;

    let api = Arc::new(MemWorkflowApi::new());
    let scope = CompanyScope::new("b27ee77c-9043-4000-b7e0-f1a920da2c2f");

    let workflow_id = api.create_workflow(&scope, &NewWorkflow::welcome("Welcome series", "newsletter")?).await?;
    let (editor, _) = WorkflowEditor::load(api.clone(), scope.clone(), &workflow_id).await?;
    let mut editor = editor.with_completeness_scope(config.workflow.completeness_scope);

    let welcome = editor.append_action(None, None, ActionDraft::new(ActionKind::Email).with_title("Welcome mail")).await?;
    let opened = editor.append_action(Some(&welcome), None, ActionDraft::new(ActionKind::Condition)).await?;
    let follow_up = editor.append_action(Some(&opened), Some(Branch::Yes), ActionDraft::new(ActionKind::Email)).await?;
    let pause = editor.append_action(Some(&opened), Some(Branch::No), ActionDraft::new(ActionKind::Wait)).await?;

    println!("{}", editor.tree().schema());
    println!("ready: {}", editor.is_ready());

    for id in [&welcome, &follow_up] {
        editor
            .edit_action(
                id,
                ActionPayload::Email(EmailPayload {
                    subject: Some("Hello".to_string()),
                    html: Some("<p>Hello there</p>".to_string()),
                    from: Some("news@example.com".to_string()),
                    reply_to: Some("support@example.com".to_string()),
                    track_open: Some(true),
                    track_click: Some(false),
                }),
            )
            .await?;
    }
    editor
        .edit_action(
            &opened,
            ActionPayload::Condition(ConditionPayload {
                criterion: Some(Criterion::Read),
                duration: Some("5d".parse()?),
            }),
        )
        .await?;
    editor
        .edit_action(
            &pause,
            ActionPayload::Wait(WaitPayload {
                duration: Some("12h".parse()?),
            }),
        )
        .await?;

    println!("ready: {}", editor.is_ready());
    editor.start_checked().await?;

    for workflow in api.list_workflows(&scope, 1, config.api.page_size).await? {
        println!("{} [{}] {}", workflow.id, workflow.status, workflow.name);
    }

    Ok(())
}
