//! Compliance state machine: `(state, event) -> state`.
//!
//! Modeled as a pure function over explicit sum types so the policy in
//! spec §4.6 is auditable and unit-testable without a session store.

use crate::entities::ComplianceRecord;
use crate::enums::{BootCheckpoint, ComplianceEvent, ComplianceState};

/// Non-exempt tool calls allowed between `update_program_state` calls
/// before the state is raised a level.
pub const JOURNAL_WARN_THRESHOLD: u32 = 10;

/// Apply `event` to `record`, returning the updated record.
///
/// `DEREZED` is terminal: once reached, further events never change state.
pub fn apply(mut record: ComplianceRecord, event: ComplianceEvent) -> ComplianceRecord {
    if record.state == ComplianceState::Derezzed {
        return record;
    }

    match event {
        ComplianceEvent::BootCheckpoint(checkpoint) => {
            match checkpoint {
                BootCheckpoint::GotProgramState => record.got_program_state = true,
                BootCheckpoint::GotTasks => record.got_tasks = true,
                BootCheckpoint::GotMessages => record.got_messages = true,
            }
            if record.got_program_state && record.got_tasks && record.got_messages {
                record.state = ComplianceState::Compliant;
            }
        }
        ComplianceEvent::JournalingActivated => {
            record.journaling_active = true;
            record.calls_since_update = 0;
        }
        ComplianceEvent::NonExemptToolCall => {
            if record.journaling_active {
                record.calls_since_update += 1;
                record.state = state_for_call_count(record.state, record.calls_since_update);
            }
        }
        ComplianceEvent::ProgramStateUpdated => {
            record.calls_since_update = 0;
            if record.journaling_active {
                record.state = ComplianceState::Compliant;
            }
        }
    }

    record
}

fn state_for_call_count(current: ComplianceState, calls: u32) -> ComplianceState {
    let level = calls / JOURNAL_WARN_THRESHOLD;
    match level {
        0 => current,
        1 => ComplianceState::Warned,
        2 => ComplianceState::Degraded,
        _ => ComplianceState::Derezzed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_checkpoints_reach_compliant() {
        let mut record = ComplianceRecord::default();
        record = apply(record, ComplianceEvent::BootCheckpoint(BootCheckpoint::GotProgramState));
        assert_eq!(record.state, ComplianceState::PendingBoot);
        record = apply(record, ComplianceEvent::BootCheckpoint(BootCheckpoint::GotTasks));
        assert_eq!(record.state, ComplianceState::PendingBoot);
        record = apply(record, ComplianceEvent::BootCheckpoint(BootCheckpoint::GotMessages));
        assert_eq!(record.state, ComplianceState::Compliant);
    }

    #[test]
    fn journaling_escalates_without_update() {
        let mut record = ComplianceRecord::default();
        record.state = ComplianceState::Compliant;
        record = apply(record, ComplianceEvent::JournalingActivated);

        for _ in 0..10 {
            record = apply(record, ComplianceEvent::NonExemptToolCall);
        }
        assert_eq!(record.state, ComplianceState::Warned);

        for _ in 0..10 {
            record = apply(record, ComplianceEvent::NonExemptToolCall);
        }
        assert_eq!(record.state, ComplianceState::Degraded);

        for _ in 0..10 {
            record = apply(record, ComplianceEvent::NonExemptToolCall);
        }
        assert_eq!(record.state, ComplianceState::Derezzed);
    }

    #[test]
    fn update_program_state_resets_and_restores_compliant() {
        let mut record = ComplianceRecord::default();
        record.state = ComplianceState::Compliant;
        record = apply(record, ComplianceEvent::JournalingActivated);
        for _ in 0..15 {
            record = apply(record, ComplianceEvent::NonExemptToolCall);
        }
        assert_eq!(record.state, ComplianceState::Warned);

        record = apply(record, ComplianceEvent::ProgramStateUpdated);
        assert_eq!(record.state, ComplianceState::Compliant);
        assert_eq!(record.calls_since_update, 0);
    }

    #[test]
    fn derezed_is_terminal() {
        let mut record = ComplianceRecord {
            state: ComplianceState::Derezzed,
            ..ComplianceRecord::default()
        };
        record = apply(record, ComplianceEvent::ProgramStateUpdated);
        assert_eq!(record.state, ComplianceState::Derezzed);
        record = apply(record, ComplianceEvent::BootCheckpoint(BootCheckpoint::GotTasks));
        assert_eq!(record.state, ComplianceState::Derezzed);
    }
}
