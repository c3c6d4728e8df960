//! Update merger: a pure function applying one handler-yielded update
//! to a `(Task, History)` snapshot, producing a new snapshot. Never
//! mutates its inputs.

use chrono::Utc;

use crate::types::{ArtifactUpdate, StatusUpdate, TaskAndHistory, TaskUpdate};

/// Apply `update` to `snapshot`, returning a new snapshot plus, for an
/// artifact update, the index in `task.artifacts` that was touched (so
/// callers can report exactly which artifact changed without
/// re-deriving the match logic above). `snapshot` is left untouched.
pub fn merge(snapshot: &TaskAndHistory, update: &TaskUpdate) -> (TaskAndHistory, Option<usize>) {
    match update {
        TaskUpdate::Status(status_update) => (merge_status(snapshot, status_update), None),
        TaskUpdate::Artifact(artifact_update) => merge_artifact(snapshot, artifact_update),
    }
}

fn merge_status(snapshot: &TaskAndHistory, update: &StatusUpdate) -> TaskAndHistory {
    let mut next = snapshot.clone();

    next.task.status.state = update.state;
    next.task.status.message = update.message.clone();
    next.task.status.timestamp = Utc::now();

    if let Some(message) = &update.message {
        if message.role == crate::types::Role::Agent {
            next.history.push(message.clone());
        }
    }

    next
}

fn merge_artifact(snapshot: &TaskAndHistory, update: &ArtifactUpdate) -> (TaskAndHistory, Option<usize>) {
    let mut next = snapshot.clone();
    let artifacts = &mut next.task.artifacts;

    let in_bounds_index = update
        .index
        .and_then(|idx| artifacts.get(idx as usize).map(|_| idx as usize));

    let touched = if let Some(pos) = in_bounds_index {
        if update.append == Some(true) {
            let mut merged = artifacts[pos].clone();
            merged.parts.extend(update.parts.clone());
            if let Some(meta) = &update.metadata {
                merged.metadata = Some(meta.clone());
            }
            if let Some(last_chunk) = update.last_chunk {
                merged.last_chunk = Some(last_chunk);
            }
            if let Some(description) = &update.description {
                merged.description = Some(description.clone());
            }
            artifacts[pos] = merged;
        } else {
            artifacts[pos] = to_artifact(update);
        }
        pos
    } else if let Some(existing_pos) = update
        .name
        .as_ref()
        .and_then(|name| artifacts.iter().position(|a| a.name.as_deref() == Some(name)))
    {
        artifacts[existing_pos] = to_artifact(update);
        existing_pos
    } else {
        artifacts.push(to_artifact(update));
        let pushed_pos = artifacts.len() - 1;
        if artifacts.iter().any(|a| a.index.is_some()) {
            let mut tagged: Vec<(usize, crate::types::Artifact)> =
                artifacts.drain(..).enumerate().collect();
            tagged.sort_by_key(|(_, a)| a.index.unwrap_or(0));
            let new_pos = tagged
                .iter()
                .position(|(orig_pos, _)| *orig_pos == pushed_pos)
                .expect("pushed artifact is still present after sort");
            *artifacts = tagged.into_iter().map(|(_, a)| a).collect();
            new_pos
        } else {
            pushed_pos
        }
    };

    (next, Some(touched))
}

fn to_artifact(update: &ArtifactUpdate) -> crate::types::Artifact {
    crate::types::Artifact {
        name: update.name.clone(),
        description: update.description.clone(),
        parts: update.parts.clone(),
        index: update.index,
        append: update.append,
        last_chunk: update.last_chunk,
        metadata: update.metadata.clone(),
    }
}
