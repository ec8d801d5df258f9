//! Retry orchestration: one streaming attempt, and on interruption a wait for
//! the service followed by exactly one more attempt.

use std::fmt;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::client::{StreamingClient, Transport};
use crate::error::StreamError;
use crate::prober::Readiness;
use crate::session::{Session, SessionState};
use crate::waiter::{wait_until_ready, WaitPolicy, WaitProgress};

/// User-visible notification emitted on each orchestrator transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    StartupReady,
    StartupUnavailable,
    /// First attempt was interrupted; waiting for the service before retrying.
    Interrupted(String),
    /// The service answered again; retrying once.
    ServiceReady,
    /// The service did not come back within the wait budget.
    DidNotWake,
    /// The single retry failed as well.
    RetryFailed(String),
    Unexpected(String),
    Cancelled,
    Completed,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::StartupReady => write!(f, "El servicio está listo."),
            Notice::StartupUnavailable => write!(
                f,
                "El servicio no está disponible en este momento. Por favor, intenta más tarde."
            ),
            Notice::Interrupted(_) => write!(
                f,
                "No se pudo contactar al servicio. Esperando a que esté disponible para reintentar..."
            ),
            Notice::ServiceReady => write!(f, "El servicio está disponible. Reintentando la consulta..."),
            Notice::DidNotWake => write!(
                f,
                "El servicio no respondió a tiempo. Por favor, intenta nuevamente más tarde."
            ),
            Notice::RetryFailed(_) => write!(
                f,
                "El reintento también falló. Por favor, intenta nuevamente más tarde."
            ),
            Notice::Unexpected(message) => write!(f, "Error inesperado: {message}"),
            Notice::Cancelled => write!(f, "Consulta cancelada."),
            Notice::Completed => write!(f, "Respuesta completa."),
        }
    }
}

/// Receives everything the orchestrator wants the user to see.
pub trait Presenter {
    fn fragment(&mut self, text: &str);

    fn notice(&mut self, notice: &Notice);

    fn progress(&mut self, _progress: WaitProgress) {}
}

/// Final result of [`Orchestrator::perform_with_retries`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed,
}

enum Attempt {
    Completed,
    Failed(StreamError),
    Cancelled,
}

/// Ties the prober, the waiter and the streaming client together.
pub struct Orchestrator<R, T> {
    prober: R,
    client: StreamingClient<T>,
    policy: WaitPolicy,
}

impl<R: Readiness, T: Transport> Orchestrator<R, T> {
    pub fn new(prober: R, client: StreamingClient<T>, policy: WaitPolicy) -> Self {
        Self {
            prober,
            client,
            policy,
        }
    }

    pub fn prober(&self) -> &R {
        &self.prober
    }

    pub fn client(&self) -> &StreamingClient<T> {
        &self.client
    }

    /// Wait for the service once per session. Later calls return the recorded readiness.
    pub async fn startup_check<P: Presenter + ?Sized>(
        &self,
        session: &mut Session,
        presenter: &mut P,
    ) -> bool {
        if session.state.startup_checked {
            return session.state.api_ready;
        }
        let cancel = session.cancel_token();
        let ready = wait_until_ready(&self.prober, &mut session.state, self.policy, &cancel, |p| {
            presenter.progress(p)
        })
        .await;
        session.state.startup_checked = true;
        let notice = if ready {
            Notice::StartupReady
        } else if cancel.is_cancelled() {
            Notice::Cancelled
        } else {
            Notice::StartupUnavailable
        };
        presenter.notice(&notice);
        ready
    }

    /// Run `query`, retrying once after a stream interruption if the service comes back.
    pub async fn perform_with_retries<P: Presenter + ?Sized>(
        &self,
        session: &mut Session,
        query: &str,
        presenter: &mut P,
    ) -> Outcome {
        let cancel = session.cancel_token();
        session.set_in_flight(true);
        let outcome = self.run(&mut session.state, &cancel, query, presenter).await;
        session.set_in_flight(false);
        outcome
    }

    async fn run<P: Presenter + ?Sized>(
        &self,
        state: &mut SessionState,
        cancel: &CancellationToken,
        query: &str,
        presenter: &mut P,
    ) -> Outcome {
        match self.attempt(state, cancel, query, presenter).await {
            Attempt::Completed => return self.completed(presenter),
            Attempt::Cancelled => return self.cancelled(presenter),
            Attempt::Failed(StreamError::Unexpected(message)) => {
                error!(%message, "query failed");
                presenter.notice(&Notice::Unexpected(message));
                return Outcome::Failed;
            }
            Attempt::Failed(StreamError::Interrupted(reason)) => {
                warn!(%reason, "first attempt interrupted, waiting for service");
                presenter.notice(&Notice::Interrupted(reason));
            }
        }

        let ready = wait_until_ready(&self.prober, state, self.policy, cancel, |p| {
            presenter.progress(p)
        })
        .await;
        if !ready {
            if cancel.is_cancelled() {
                return self.cancelled(presenter);
            }
            presenter.notice(&Notice::DidNotWake);
            return Outcome::Failed;
        }
        presenter.notice(&Notice::ServiceReady);

        match self.attempt(state, cancel, query, presenter).await {
            Attempt::Completed => self.completed(presenter),
            Attempt::Cancelled => self.cancelled(presenter),
            Attempt::Failed(e) => {
                error!(error = %e, "retry failed");
                presenter.notice(&Notice::RetryFailed(e.to_string()));
                Outcome::Failed
            }
        }
    }

    async fn attempt<P: Presenter + ?Sized>(
        &self,
        state: &mut SessionState,
        cancel: &CancellationToken,
        query: &str,
        presenter: &mut P,
    ) -> Attempt {
        let opened = tokio::select! {
            _ = cancel.cancelled() => return Attempt::Cancelled,
            opened = self.client.stream(query) => opened,
        };
        let (mut answer, completion) = match opened {
            Ok(pair) => pair,
            Err(e) => return Attempt::Failed(e),
        };
        loop {
            let item = tokio::select! {
                _ = cancel.cancelled() => return Attempt::Cancelled,
                item = answer.next() => item,
            };
            match item {
                Some(Ok(text)) => presenter.fragment(&text),
                Some(Err(e)) => return Attempt::Failed(e),
                None => break,
            }
        }
        drop(answer);
        completion.apply(state).await;
        Attempt::Completed
    }

    fn completed<P: Presenter + ?Sized>(&self, presenter: &mut P) -> Outcome {
        info!("query completed");
        presenter.notice(&Notice::Completed);
        Outcome::Completed
    }

    fn cancelled<P: Presenter + ?Sized>(&self, presenter: &mut P) -> Outcome {
        info!("query cancelled");
        presenter.notice(&Notice::Cancelled);
        Outcome::Failed
    }
}
