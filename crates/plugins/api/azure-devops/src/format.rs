//! Text rendering of Azure DevOps payloads for tool results.
//!
//! Every renderer returns one markdown-ish text block. Empty collections
//! render an explicit "no results" line instead of an empty list.

use crate::patch;
use crate::types::{
    short_branch, Build, BuildArtifact, Pipeline, PipelineRun, Project, PullRequest, Repository,
    WorkItem,
};

const UNASSIGNED: &str = "Unassigned";

// ============================================================================
// Work items
// ============================================================================

/// Icon for a work-item state.
pub fn state_icon(state: &str) -> &'static str {
    match state {
        "New" => "🆕",
        "Active" => "🔄",
        "Resolved" | "Closed" => "✅",
        "Removed" => "🗑️",
        _ => "📋",
    }
}

pub fn created_work_item(
    item: &WorkItem,
    work_item_type: &str,
    project: &str,
    assignee: Option<&str>,
) -> String {
    let mut output = String::from("✅ **Work item created**\n\n");
    output.push_str(&format!("🆔 **ID:** #{}\n", item.id));
    output.push_str(&format!("📋 **Type:** {}\n", work_item_type));
    output.push_str(&format!("📝 **Title:** {}\n", item.title()));
    output.push_str(&format!("👤 **Project:** {}\n", project));
    if let Some(assignee) = assignee {
        output.push_str(&format!("👨‍💼 **Assigned to:** {}\n", assignee));
    }
    push_link(&mut output, item.url(), "Open in Azure DevOps");
    output
}

/// Search results; `heading` is the caller's query or a project label.
pub fn work_item_list(heading: &str, items: &[WorkItem]) -> String {
    if items.is_empty() {
        return format!("🔍 **No results for query:** '{}'", heading);
    }

    let mut output = format!("🔍 **Results for:** '{}'\n", heading);
    output.push_str(&format!("📊 **Found:** {} work items\n\n", items.len()));

    for item in items {
        let state = item.state();
        output.push_str(&format!(
            "{} **#{}** - {}\n",
            state_icon(state),
            item.id,
            item.title()
        ));
        output.push_str(&format!(
            "   📂 **Type:** {} | 📊 **State:** {} | 👤 **Assigned:** {}\n\n",
            item.work_item_type(),
            state,
            item.identity(patch::ASSIGNED_TO).unwrap_or(UNASSIGNED)
        ));
    }

    output
}

pub fn work_item_details(item: &WorkItem) -> String {
    let mut output = format!("📋 **Work item #{}**\n\n", item.id);
    output.push_str(&format!("📝 **Title:** {}\n", item.title()));
    output.push_str(&format!("📂 **Type:** {}\n", item.work_item_type()));
    output.push_str(&format!("📊 **State:** {}\n", item.state()));
    output.push_str(&format!(
        "👤 **Assigned to:** {}\n",
        item.identity(patch::ASSIGNED_TO).unwrap_or(UNASSIGNED)
    ));
    output.push_str(&format!(
        "👨‍💻 **Created by:** {}\n",
        item.identity("System.CreatedBy").unwrap_or("Unknown")
    ));
    output.push_str(&format!(
        "📅 **Created:** {}\n",
        date(item.field("System.CreatedDate"))
    ));
    output.push_str(&format!(
        "🔄 **Changed:** {}\n",
        date(item.field("System.ChangedDate"))
    ));

    if let Some(tags) = item.field(patch::TAGS).filter(|t| !t.is_empty()) {
        output.push_str(&format!("🏷️ **Tags:** {}\n", tags));
    }

    output.push_str(&format!(
        "\n📄 **Description:**\n{}\n",
        item.field(patch::DESCRIPTION).unwrap_or("(no description)")
    ));

    if let Some(url) = item.url() {
        output.push_str(&format!("\n🔗 **Link:** [Open in Azure DevOps]({})", url));
    }

    output
}

pub fn updated_work_item(item: &WorkItem) -> String {
    let mut output = format!("✅ **Work item #{} updated**\n\n", item.id);
    output.push_str(&format!("📝 **Title:** {}\n", item.title()));
    output.push_str(&format!("📊 **State:** {}\n", item.state()));
    push_link(&mut output, item.url(), "Open in Azure DevOps");
    output
}

// ============================================================================
// Pipelines
// ============================================================================

/// Icon for a run or build status/result, case-insensitive.
pub fn status_icon(status: &str) -> &'static str {
    match status.to_ascii_lowercase().as_str() {
        "inprogress" | "notstarted" => "🔄",
        "completed" | "succeeded" => "✅",
        "cancelling" | "canceled" => "⏹️",
        "failed" => "❌",
        _ => "📋",
    }
}

pub fn started_run(run: &PipelineRun, branch: &str, project: &str) -> String {
    let pipeline = run
        .pipeline
        .as_ref()
        .and_then(|p| p.name.as_deref())
        .unwrap_or("Unknown");

    let mut output = String::from("🚀 **Pipeline started**\n\n");
    output.push_str(&format!("🆔 **Run ID:** {}\n", run.id));
    output.push_str(&format!("📋 **Pipeline:** {}\n", pipeline));
    output.push_str(&format!("🌿 **Branch:** {}\n", branch));
    output.push_str(&format!("👤 **Project:** {}\n", project));
    output.push_str(&format!(
        "📊 **State:** {}\n",
        run.state.as_deref().unwrap_or("Unknown")
    ));
    push_link(
        &mut output,
        run.links.as_ref().and_then(|l| l.browser_url()),
        "View in Azure DevOps",
    );
    output
}

pub const NO_RUNS: &str = "📊 **No pipeline runs to show**";

/// Runs of a single pipeline from the Pipelines API.
pub fn pipeline_runs(pipeline_id: i64, runs: &[PipelineRun]) -> String {
    if runs.is_empty() {
        return NO_RUNS.to_string();
    }

    let mut output = format!("📊 **Pipeline runs** (pipeline {})\n\n", pipeline_id);
    for run in runs {
        let state = run.state.as_deref().unwrap_or("Unknown");
        let name = run
            .name
            .as_deref()
            .or(run.pipeline.as_ref().and_then(|p| p.name.as_deref()))
            .unwrap_or("Unknown");
        output.push_str(&format!("{} **#{}** - {}\n", status_icon(state), run.id, name));
        output.push_str(&status_line(
            state,
            run.result.as_deref(),
            run.created_date.as_deref(),
        ));
    }
    output
}

/// Builds across all definitions from the Build API.
pub fn build_runs(builds: &[Build]) -> String {
    if builds.is_empty() {
        return NO_RUNS.to_string();
    }

    let mut output = String::from("📊 **Pipeline runs** (all)\n\n");
    for build in builds {
        let status = build.status.as_deref().unwrap_or("Unknown");
        output.push_str(&format!(
            "{} **#{}** - {}\n",
            status_icon(status),
            build.id,
            definition_name(build)
        ));
        output.push_str(&status_line(
            status,
            build.result.as_deref(),
            build.start_time.as_deref().or(build.queue_time.as_deref()),
        ));
    }
    output
}

/// Recent builds of one definition, with branch and timing.
pub fn pipeline_status(pipeline_id: i64, builds: &[Build]) -> String {
    if builds.is_empty() {
        return format!("📊 **No builds found for pipeline {}**", pipeline_id);
    }

    let mut output = format!(
        "📊 **Pipeline {}** ({}): last {} builds\n\n",
        pipeline_id,
        definition_name(&builds[0]),
        builds.len()
    );
    for build in builds {
        let status = build.status.as_deref().unwrap_or("Unknown");
        let result = build.result.as_deref();
        output.push_str(&format!(
            "{} **#{}**",
            status_icon(result.unwrap_or(status)),
            build.id
        ));
        if let Some(number) = &build.build_number {
            output.push_str(&format!(" ({})", number));
        }
        output.push('\n');

        output.push_str(&format!("   📊 **Status:** {}", status));
        if let Some(result) = result {
            output.push_str(&format!(" | 🎯 **Result:** {}", result));
        }
        if let Some(branch) = &build.source_branch {
            output.push_str(&format!(" | 🌿 **Branch:** {}", short_branch(branch)));
        }
        output.push('\n');

        if let Some(start) = &build.start_time {
            output.push_str(&format!("   🕐 **Started:** {}", minutes(start)));
            if let Some(finish) = &build.finish_time {
                output.push_str(&format!(" | 🏁 **Finished:** {}", minutes(finish)));
            }
            output.push('\n');
        }
        output.push('\n');
    }
    output
}

pub fn build_artifacts(build_id: i64, artifacts: &[BuildArtifact]) -> String {
    if artifacts.is_empty() {
        return format!("📦 **No artifacts for build #{}**", build_id);
    }

    let mut output = format!("📦 **Artifacts of build #{}**\n\n", build_id);
    for artifact in artifacts {
        output.push_str(&format!("📄 **{}**\n", artifact.name));
        if let Some(url) = artifact
            .resource
            .as_ref()
            .and_then(|r| r.download_url.as_deref())
            .filter(|u| !u.is_empty())
        {
            output.push_str(&format!("   📥 **Download:** [Download artifact]({})\n", url));
        }
        output.push('\n');
    }
    output
}

// ============================================================================
// Repositories and pull requests
// ============================================================================

pub fn repositories(project: Option<&str>, repos: &[Repository]) -> String {
    if repos.is_empty() {
        return "📂 **No repositories to show**".to_string();
    }

    let scope = match project {
        Some(project) => format!("(project: {})", project),
        None => "(all)".to_string(),
    };
    let mut output = format!("📂 **Git repositories** {}\n\n", scope);

    for repo in repos {
        let short_id = repo.id.get(..8).unwrap_or(&repo.id);
        output.push_str(&format!("📦 **{}** (ID: {}...)\n", repo.name, short_id));
        output.push_str(&format!(
            "   🌿 **Default branch:** {}\n",
            short_branch(repo.default_branch.as_deref().unwrap_or("refs/heads/main"))
        ));
        if let Some(size) = repo.size.filter(|s| *s > 0) {
            output.push_str(&format!("   📏 **Size:** {} bytes\n", size));
        }
        if let Some(url) = repo.web_url.as_deref().filter(|u| !u.is_empty()) {
            output.push_str(&format!("   🔗 **URL:** [Open repository]({})\n", url));
        }
        output.push('\n');
    }
    output
}

pub struct PullRequestSummary<'a> {
    pub title: &'a str,
    pub source_branch: &'a str,
    pub target_branch: &'a str,
    pub reviewers: &'a [String],
    pub work_items: &'a [i64],
}

pub fn created_pull_request(pr: &PullRequest, summary: &PullRequestSummary<'_>) -> String {
    let mut output = String::from("🔄 **Pull request created**\n\n");
    output.push_str(&format!("🆔 **PR ID:** #{}\n", pr.pull_request_id));
    output.push_str(&format!("📝 **Title:** {}\n", summary.title));
    output.push_str(&format!(
        "🌿 **Branch:** {} → {}\n",
        summary.source_branch, summary.target_branch
    ));
    if !summary.reviewers.is_empty() {
        output.push_str(&format!("👥 **Reviewers:** {}\n", summary.reviewers.join(", ")));
    }
    if !summary.work_items.is_empty() {
        let ids: Vec<String> = summary.work_items.iter().map(i64::to_string).collect();
        output.push_str(&format!("📋 **Linked work items:** {}\n", ids.join(", ")));
    }
    push_link(
        &mut output,
        pr.links.as_ref().and_then(|l| l.browser_url()),
        "Open pull request",
    );
    output
}

// ============================================================================
// Resources
// ============================================================================

pub fn project_names(projects: &[Project]) -> String {
    bullets(
        "📂 **Azure DevOps projects:**",
        projects.iter().map(|p| p.name.clone()),
    )
}

pub fn pipeline_names(project: &str, pipelines: &[Pipeline]) -> String {
    bullets(
        &format!("🚀 **Pipelines ({}):**", project),
        pipelines.iter().map(|p| format!("#{} - {}", p.id, p.name)),
    )
}

pub fn active_work_item_ids(project: &str, ids: &[i64]) -> String {
    if ids.is_empty() {
        return format!("📋 **No active work items in project {}**", project);
    }
    bullets(
        &format!("📋 **Active work items ({}):**", project),
        ids.iter().map(|id| format!("#{}", id)),
    )
}

pub fn repository_names(repos: &[Repository]) -> String {
    bullets(
        "📂 **Git repositories:**",
        repos.iter().map(|r| r.name.clone()),
    )
}

// ============================================================================
// Helpers
// ============================================================================

fn bullets(heading: &str, items: impl Iterator<Item = String>) -> String {
    let mut output = heading.to_string();
    for item in items {
        output.push_str("\n• ");
        output.push_str(&item);
    }
    output
}

fn push_link(output: &mut String, url: Option<&str>, label: &str) {
    if let Some(url) = url {
        output.push_str(&format!("🔗 **Link:** [{}]({})", label, url));
    }
}

fn status_line(status: &str, result: Option<&str>, started: Option<&str>) -> String {
    let mut line = format!("   📊 **Status:** {}", status);
    if let Some(result) = result {
        line.push_str(&format!(" | 🎯 **Result:** {}", result));
    }
    if let Some(started) = started.filter(|s| !s.is_empty()) {
        line.push_str(&format!(" | 🕐 **Start:** {}", minutes(started)));
    }
    line.push_str("\n\n");
    line
}

fn definition_name(build: &Build) -> &str {
    build
        .definition
        .as_ref()
        .and_then(|d| d.name.as_deref())
        .unwrap_or("Unknown")
}

/// `YYYY-MM-DD` prefix of an ISO timestamp.
fn date(timestamp: Option<&str>) -> &str {
    match timestamp {
        Some(ts) if !ts.is_empty() => ts.get(..10).unwrap_or(ts),
        _ => "Unknown",
    }
}

/// `YYYY-MM-DDTHH:MM` prefix of an ISO timestamp.
fn minutes(timestamp: &str) -> &str {
    timestamp.get(..16).unwrap_or(timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn work_item(value: serde_json::Value) -> WorkItem {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_empty_lists_render_no_results() {
        assert_eq!(
            work_item_list("login", &[]),
            "🔍 **No results for query:** 'login'"
        );
        assert_eq!(pipeline_runs(3, &[]), NO_RUNS);
        assert_eq!(build_runs(&[]), NO_RUNS);
        assert!(build_artifacts(9, &[]).contains("#9"));
        assert!(repositories(None, &[]).contains("No repositories"));
        assert!(active_work_item_ids("Ops", &[]).contains("No active work items"));
    }

    #[test]
    fn test_work_item_list() {
        let items = vec![work_item(json!({
            "id": 12,
            "fields": {
                "System.Title": "Login fails",
                "System.State": "Active",
                "System.WorkItemType": "Bug"
            }
        }))];

        let text = work_item_list("login", &items);
        assert!(text.contains("**Found:** 1 work items"));
        assert!(text.contains("🔄 **#12** - Login fails"));
        assert!(text.contains("**Assigned:** Unassigned"));
    }

    #[test]
    fn test_work_item_details_truncates_dates() {
        let item = work_item(json!({
            "id": 4,
            "fields": {
                "System.Title": "T",
                "System.CreatedDate": "2024-03-01T10:20:30.123Z",
                "System.Tags": "api; backend"
            }
        }));

        let text = work_item_details(&item);
        assert!(text.contains("**Created:** 2024-03-01\n"));
        assert!(text.contains("**Changed:** Unknown"));
        assert!(text.contains("**Tags:** api; backend"));
        assert!(text.contains("(no description)"));
        assert!(!text.contains("**Link:**"));
    }

    #[test]
    fn test_status_icons() {
        assert_eq!(status_icon("inProgress"), "🔄");
        assert_eq!(status_icon("Succeeded"), "✅");
        assert_eq!(status_icon("failed"), "❌");
        assert_eq!(status_icon("whatever"), "📋");
        assert_eq!(state_icon("Closed"), "✅");
    }

    #[test]
    fn test_repositories_shorten_ids() {
        let repos: Vec<Repository> = serde_json::from_value(json!([
            {"id": "0123456789abcdef", "name": "api", "defaultBranch": "refs/heads/develop", "size": 0},
            {"id": "short", "name": "web"}
        ]))
        .unwrap();

        let text = repositories(Some("Ops"), &repos);
        assert!(text.contains("(project: Ops)"));
        assert!(text.contains("**api** (ID: 01234567...)"));
        assert!(text.contains("**Default branch:** develop"));
        assert!(text.contains("**web** (ID: short...)"));
        assert!(!text.contains("**Size:**"));
    }

    #[test]
    fn test_bullet_resources() {
        let projects: Vec<Project> =
            serde_json::from_value(json!([{"name": "Ops"}, {"name": "Web"}])).unwrap();
        assert_eq!(
            project_names(&projects),
            "📂 **Azure DevOps projects:**\n• Ops\n• Web"
        );
        assert_eq!(
            active_work_item_ids("Ops", &[3, 5]),
            "📋 **Active work items (Ops):**\n• #3\n• #5"
        );
    }
}
