//! Task commands.

use todo_client::api::{NewTask, TaskFilter, TaskStatus, TaskUpdate, TodoClient};
use todo_client::render::Renderer;

use super::CommandResult;

pub(super) async fn list(
    renderer: &Renderer,
    client: &TodoClient,
    filter: TaskFilter,
    search: Option<String>,
) -> CommandResult {
    let page = match search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(text) => client.tasks().search_tasks(text, &filter).await?,
        None => client.tasks().get_tasks(&filter).await?,
    };
    renderer.task_page(&page);
    Ok(())
}

pub(super) async fn show(renderer: &Renderer, client: &TodoClient, id: &str) -> CommandResult {
    let task = client.tasks().get_task(id).await?;
    renderer.task_detail(&task);
    Ok(())
}

pub(super) async fn add(renderer: &Renderer, client: &TodoClient, task: &NewTask) -> CommandResult {
    let created = client.tasks().create_task(task).await?;
    renderer.activity("task created");
    renderer.task_line(&created);
    Ok(())
}

pub(super) async fn edit(
    renderer: &Renderer,
    client: &TodoClient,
    id: &str,
    update: &TaskUpdate,
) -> CommandResult {
    let updated = client.tasks().update_task(id, update).await?;
    renderer.activity("task updated");
    renderer.task_line(&updated);
    Ok(())
}

pub(super) async fn toggle(renderer: &Renderer, client: &TodoClient, id: &str) -> CommandResult {
    let task = client.tasks().toggle_task_status(id).await?;
    renderer.task_line(&task);
    Ok(())
}

pub(super) async fn remove(renderer: &Renderer, client: &TodoClient, id: &str) -> CommandResult {
    client.tasks().delete_task(id).await?;
    renderer.activity(&format!("deleted {id}"));
    Ok(())
}

pub(super) async fn bulk_done(
    renderer: &Renderer,
    client: &TodoClient,
    ids: &[String],
) -> CommandResult {
    let update = TaskUpdate {
        status: Some(TaskStatus::Completed),
        ..TaskUpdate::default()
    };
    let result = client.tasks().bulk_update(ids, &update).await?;
    renderer.activity(&format!("completed {} task(s)", result.affected));
    Ok(())
}

pub(super) async fn bulk_remove(
    renderer: &Renderer,
    client: &TodoClient,
    ids: &[String],
) -> CommandResult {
    let result = client.tasks().bulk_delete(ids).await?;
    renderer.activity(&format!("deleted {} task(s)", result.affected));
    Ok(())
}

pub(super) async fn stats(renderer: &Renderer, client: &TodoClient) -> CommandResult {
    let stats = client.tasks().get_stats().await?;
    renderer.stats(&stats);
    Ok(())
}
