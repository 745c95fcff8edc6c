use std::future::Future;

use tokio::task::JoinSet;

use crate::application::ports::StageError;

/// First batch that failed during a fan-out.
#[derive(Debug)]
pub struct BatchFailure {
    pub index: Option<usize>,
    pub error: StageError,
}

/// Runs `task` once per input with at most `limit` invocations outstanding.
///
/// Inputs are admitted in submission order as slots free up. After the first
/// failure nothing new is admitted; invocations already running are awaited
/// and their results dropped. On success the outputs are returned in input
/// order regardless of completion order.
pub async fn run_bounded<I, T, F, Fut>(
    inputs: Vec<I>,
    limit: usize,
    task: F,
) -> Result<Vec<T>, BatchFailure>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T, StageError>> + Send + 'static,
    T: Send + 'static,
{
    let limit = limit.max(1);
    let mut results: Vec<Option<T>> = inputs.iter().map(|_| None).collect();
    let mut pending = inputs.into_iter().enumerate();
    let mut in_flight = JoinSet::new();
    let mut failure: Option<BatchFailure> = None;

    loop {
        while failure.is_none() && in_flight.len() < limit {
            let Some((index, input)) = pending.next() else {
                break;
            };
            let invocation = task(input);
            in_flight.spawn(async move { (index, invocation.await) });
        }

        let Some(joined) = in_flight.join_next().await else {
            break;
        };

        match joined {
            Ok((index, Ok(output))) => {
                if failure.is_none() {
                    results[index] = Some(output);
                }
            }
            Ok((index, Err(error))) => {
                if failure.is_none() {
                    failure = Some(BatchFailure {
                        index: Some(index),
                        error,
                    });
                } else {
                    tracing::debug!(batch_index = index, error = %error, "Sibling batch also failed");
                }
            }
            Err(join_error) => {
                if failure.is_none() {
                    failure = Some(BatchFailure {
                        index: None,
                        error: StageError::Crashed(join_error.to_string()),
                    });
                }
            }
        }
    }

    if let Some(failure) = failure {
        return Err(failure);
    }

    results
        .into_iter()
        .collect::<Option<Vec<T>>>()
        .ok_or_else(|| BatchFailure {
            index: None,
            error: StageError::Crashed("batch result missing".to_string()),
        })
}
