//! Snapshot diffing: observed file content in, events and actions out.
//!
//! These functions touch no files, channels or processes. They update the
//! session's last-observed counters and say what should happen; the
//! coordinator carries it out.

use super::state::{SessionPhase, SessionState};
use crate::models::{CollaboratorSnapshot, ProfileRecord, ProfileSnapshot, SessionEvent};

/// Something the coordinator must do after a reconcile step.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Publish an event to the session's subscribers.
    Emit(SessionEvent),
    /// Launch a collaborator scan for this profile.
    StartCollaborators(ProfileRecord),
    /// Move the session to another phase.
    Transition(SessionPhase),
}

/// React to a new profile snapshot.
///
/// `progress_update` goes out whenever the profile count differs from the
/// last observation. Once the profile marker exists and exactly one profile
/// was found, collaborator scraping starts automatically, at most once per
/// session and never when the collaborator marker already exists.
pub fn profiles_changed(
    state: &mut SessionState,
    snapshot: &ProfileSnapshot,
    main_done: bool,
    collaborators_done: bool,
) -> Vec<Action> {
    let session_id = state.id.to_string();
    let mut actions = Vec::new();
    let count = snapshot.len();

    state.profiles.clone_from(&snapshot.profiles);

    if state.profile_count != Some(count) {
        state.profile_count = Some(count);
        let searched_name = if snapshot.searched_name.is_empty() {
            state.searched_name.as_str()
        } else {
            snapshot.searched_name.as_str()
        };
        actions.push(Action::Emit(SessionEvent::progress_update(
            &session_id,
            count,
            snapshot.total_profiles,
            snapshot.status,
            searched_name,
        )));
    }

    let auto_start = main_done
        && count == 1
        && !collaborators_done
        && !state.auto_start_checked
        && !state.collaborators_started;
    if auto_start {
        state.auto_start_checked = true;
        let profile = &snapshot.profiles[0];
        if profile.has_profile_url() {
            state.collaborators_started = true;
            state.selected_profile = Some(profile.clone());
            actions.push(Action::Emit(SessionEvent::auto_collaborator_start(&session_id, profile)));
            actions.push(Action::StartCollaborators(profile.clone()));
        } else {
            actions.push(Action::Emit(SessionEvent::profile_url_missing(&session_id)));
        }
    }

    actions
}

/// React to the profile run exiting successfully.
///
/// Catches up on the final snapshot first, then decides where the session
/// goes: no results ends it, several results wait for a selection, a single
/// result has already been handed to [`profiles_changed`].
pub fn profiles_finished(
    state: &mut SessionState,
    snapshot: &ProfileSnapshot,
    main_done: bool,
    collaborators_done: bool,
) -> Vec<Action> {
    let session_id = state.id.to_string();
    let mut actions = profiles_changed(state, snapshot, main_done, collaborators_done);

    match snapshot.len() {
        0 => {
            actions.push(Action::Emit(SessionEvent::no_results(&session_id)));
            actions.push(Action::Transition(SessionPhase::Completed));
        }
        1 if state.collaborators_started => {}
        1 => actions.push(Action::Transition(SessionPhase::AwaitingSelection)),
        _ => {
            actions.push(Action::Emit(SessionEvent::multiple_profiles_found(
                &session_id,
                &snapshot.profiles,
            )));
            actions.push(Action::Transition(SessionPhase::AwaitingSelection));
        }
    }

    actions
}

/// React to a new collaborator snapshot.
///
/// Growth emits one `collaborator_found` carrying only the newest record. A
/// first observation with zero collaborators is the "none found" signal.
/// `collaborators_completed` is emitted at most once per session.
pub fn collaborators_changed(
    state: &mut SessionState,
    snapshot: &CollaboratorSnapshot,
    collaborators_done: bool,
) -> Vec<SessionEvent> {
    let session_id = state.id.to_string();
    let mut events = Vec::new();
    let count = snapshot.len();

    match state.collaborator_count {
        None if count == 0 => {
            events.push(SessionEvent::no_collaborators_found(&session_id));
            if !state.collaborators_reported {
                state.collaborators_reported = true;
                events.push(SessionEvent::collaborators_completed(&session_id, 0));
            }
        }
        previous if count > previous.unwrap_or(0) => {
            if let Some(latest) = snapshot.latest() {
                events.push(SessionEvent::collaborator_found(&session_id, latest, count));
            }
        }
        _ => {}
    }
    state.collaborator_count = Some(state.collaborator_count.map_or(count, |prev| prev.max(count)));

    if collaborators_done && !state.collaborators_reported {
        state.collaborators_reported = true;
        events.push(SessionEvent::collaborators_completed(&session_id, count));
    }

    events
}
