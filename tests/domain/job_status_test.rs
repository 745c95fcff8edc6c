use underwriter::domain::{JobStatus, Stage};

#[test]
fn given_success_path_when_walking_next_then_statuses_follow_pipeline_order() {
    let mut status = JobStatus::Created;
    let mut walked = vec![status];
    while let Some(next) = status.next() {
        walked.push(next);
        status = next;
    }

    assert_eq!(
        walked,
        vec![
            JobStatus::Created,
            JobStatus::Classifying,
            JobStatus::Batching,
            JobStatus::Extracting,
            JobStatus::Analyzing,
            JobStatus::Acting,
            JobStatus::Complete,
        ]
    );
}

#[test]
fn given_any_non_terminal_status_when_failing_then_transition_is_allowed() {
    for status in JobStatus::ALL.into_iter().filter(|s| !s.is_terminal()) {
        assert!(status.can_transition_to(JobStatus::Failed), "{status}");
    }
}

#[test]
fn given_terminal_status_when_transitioning_then_nothing_is_allowed() {
    for target in JobStatus::ALL {
        assert!(!JobStatus::Complete.can_transition_to(target));
        assert!(!JobStatus::Failed.can_transition_to(target));
    }
}

#[test]
fn given_status_when_skipping_or_going_backwards_then_transition_is_rejected() {
    assert!(!JobStatus::Created.can_transition_to(JobStatus::Batching));
    assert!(!JobStatus::Extracting.can_transition_to(JobStatus::Classifying));
    assert!(!JobStatus::Acting.can_transition_to(JobStatus::Acting));
}

#[test]
fn given_persisted_text_when_parsing_then_round_trips_every_status() {
    for status in JobStatus::ALL {
        assert_eq!(status.as_str().parse::<JobStatus>(), Ok(status));
    }
    assert!("complete".parse::<JobStatus>().is_err());
}

#[test]
fn given_status_when_serializing_then_uses_upper_case_text() {
    let json = serde_json::to_string(&JobStatus::Extracting).unwrap();
    assert_eq!(json, "\"EXTRACTING\"");
}

#[test]
fn given_each_stage_when_completed_then_status_moves_one_step_forward() {
    for stage in Stage::SEQUENCE {
        assert_eq!(stage.running_status().next(), Some(stage.completed_status()));
    }
    assert_eq!(Stage::BatchPlan.name(), "Batch-Plan");
    assert_eq!(Stage::Act.completed_status(), JobStatus::Complete);
}
