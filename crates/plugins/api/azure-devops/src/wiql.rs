//! WIQL (Work Item Query Language) builders.

const FIELDS: &str =
    "[System.Id], [System.Title], [System.State], [System.WorkItemType], [System.AssignedTo]";

/// Quote a string literal, doubling embedded single quotes.
pub fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// True when `query` is already WIQL rather than free text.
pub fn is_wiql(query: &str) -> bool {
    query
        .trim_start()
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("select"))
}

/// Title search, optionally scoped to a project, newest changes first.
pub fn title_search(text: &str, project: Option<&str>) -> String {
    let mut query = format!(
        "SELECT {} FROM WorkItems WHERE [System.Title] CONTAINS {}",
        FIELDS,
        quote(text)
    );
    if let Some(project) = project {
        query.push_str(&format!(" AND [System.TeamProject] = {}", quote(project)));
    }
    query.push_str(" ORDER BY [System.ChangedDate] DESC");
    query
}

/// Use `query` as-is if it is WIQL, otherwise turn it into a title search.
pub fn from_user_query(query: &str, project: Option<&str>) -> String {
    if is_wiql(query) {
        query.to_string()
    } else {
        title_search(query, project)
    }
}

/// Everything in a project, newest changes first.
pub fn project_items(project: &str) -> String {
    format!(
        "SELECT {} FROM WorkItems WHERE [System.TeamProject] = {} ORDER BY [System.ChangedDate] DESC",
        FIELDS,
        quote(project)
    )
}

/// New and Active items in a project, newest changes first.
pub fn active_items(project: &str) -> String {
    format!(
        "SELECT {} FROM WorkItems WHERE [System.TeamProject] = {} AND [System.State] IN ('New', 'Active') ORDER BY [System.ChangedDate] DESC",
        FIELDS,
        quote(project)
    )
}
