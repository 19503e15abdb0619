//! Execution actor - runs request executions in the Tokio async runtime

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;

use crate::engine::executor::execute_recorded;
use crate::engine::transport::Transport;
use crate::history::SharedHistory;
use crate::messages::{ExecutionCommand, ExecutionEvent, Ticket};
use crate::models::RequestTemplate;
use crate::variables::ScopeChain;

/// Execution actor that processes execute and cancel commands.
///
/// Every execution runs as its own task, so several can be in flight at once,
/// including repeated runs of the same request.
pub struct ExecutionActor {
    transport: Arc<dyn Transport>,
    history: SharedHistory,
    event_tx: mpsc::UnboundedSender<ExecutionEvent>,
    active: JoinSet<Ticket>,
    cancel_handles: HashMap<Ticket, oneshot::Sender<()>>,
}

impl ExecutionActor {
    pub fn new(
        transport: Arc<dyn Transport>,
        history: SharedHistory,
        event_tx: mpsc::UnboundedSender<ExecutionEvent>,
    ) -> Self {
        ExecutionActor {
            transport,
            history,
            event_tx,
            active: JoinSet::new(),
            cancel_handles: HashMap::new(),
        }
    }

    /// Run the execution actor message loop
    pub async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<ExecutionCommand>) {
        loop {
            tokio::select! {
                biased;

                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(ExecutionCommand::Execute { ticket, template, scopes, timeout }) => {
                            self.spawn_execution(ticket, template, scopes, timeout);
                        }

                        Some(ExecutionCommand::Cancel(ticket)) => {
                            if let Some(cancel_tx) = self.cancel_handles.remove(&ticket) {
                                tracing::info!(ticket, "Cancelling execution");
                                let _ = cancel_tx.send(());
                            }
                        }

                        Some(ExecutionCommand::Shutdown) | None => {
                            for (_, cancel_tx) in self.cancel_handles.drain() {
                                let _ = cancel_tx.send(());
                            }
                            break;
                        }
                    }
                }

                Some(joined) = self.active.join_next() => {
                    match joined {
                        Ok(ticket) => {
                            self.cancel_handles.remove(&ticket);
                        }
                        Err(e) => tracing::warn!(error = %e, "Execution task failed"),
                    }
                }
            }
        }

        while self.active.join_next().await.is_some() {}
        tracing::debug!("Execution actor stopped");
    }

    fn spawn_execution(
        &mut self,
        ticket: Ticket,
        template: RequestTemplate,
        scopes: ScopeChain,
        timeout: Duration,
    ) {
        let (cancel_tx, mut cancel_rx) = oneshot::channel();
        self.cancel_handles.insert(ticket, cancel_tx);

        let transport = Arc::clone(&self.transport);
        let history = Arc::clone(&self.history);
        let event_tx = self.event_tx.clone();

        self.active.spawn(async move {
            let request_id = template.id;
            tracing::info!(ticket, request = %request_id, name = %template.name, method = template.method.as_str(), "Executing request");

            let progress_tx = event_tx.clone();
            let progress = move |bytes_received: usize| {
                let _ = progress_tx.send(ExecutionEvent::Progress { ticket, bytes_received });
            };

            tokio::select! {
                biased;

                Ok(()) = &mut cancel_rx => {
                    tracing::info!(ticket, request = %request_id, "Execution cancelled");
                    let _ = event_tx.send(ExecutionEvent::Cancelled { ticket, request_id });
                }

                result = execute_recorded(transport.as_ref(), &template, &scopes, timeout, &history, &progress) => {
                    match &result {
                        Ok(entry) => match entry.response() {
                            Some(record) => tracing::info!(ticket, status = record.status, elapsed_ms = (record.elapsed.as_millis() as u64), "Request completed"),
                            None => tracing::warn!(ticket, error = ?entry.failure().map(|f| f.error.to_string()), "Request failed"),
                        },
                        Err(e) => tracing::warn!(ticket, error = %e, "Request not sent"),
                    }
                    let _ = event_tx.send(ExecutionEvent::Finished { ticket, request_id, result });
                }
            }

            ticket
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::NodeId;
    use crate::engine::executor::tests::{GatedTransport, SilentTransport, StaticTransport};
    use crate::error::ExecutionError;
    use crate::history::{lock_history, HistoryLog};
    use crate::models::HttpMethod;
    use crate::variables::{ScopeKind, VariableMap};

    fn template(id: u64, url: &str) -> RequestTemplate {
        let mut template = RequestTemplate::new("req", HttpMethod::GET, url);
        template.id = NodeId(id);
        template
    }

    fn scopes() -> ScopeChain {
        let mut vars = VariableMap::new();
        vars.insert("base".into(), "https://api.example.com".into());
        ScopeChain::new().with(ScopeKind::Environment("dev".into()), vars)
    }

    fn start(
        transport: Arc<dyn Transport>,
    ) -> (
        mpsc::UnboundedSender<ExecutionCommand>,
        mpsc::UnboundedReceiver<ExecutionEvent>,
        SharedHistory,
    ) {
        let history = HistoryLog::new(10).into_shared();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let actor = ExecutionActor::new(transport, Arc::clone(&history), event_tx);
        tokio::spawn(actor.run(cmd_rx));
        (cmd_tx, event_rx, history)
    }

    fn execute(ticket: Ticket, template: RequestTemplate) -> ExecutionCommand {
        ExecutionCommand::Execute {
            ticket,
            template,
            scopes: scopes(),
            timeout: Duration::from_secs(5),
        }
    }

    async fn next_terminal(events: &mut mpsc::UnboundedReceiver<ExecutionEvent>) -> ExecutionEvent {
        loop {
            let event = events.recv().await.expect("engine stopped");
            if event.is_terminal() {
                return event;
            }
        }
    }

    #[tokio::test]
    async fn test_execute_reports_progress_then_finished() {
        let (cmd_tx, mut events, history) = start(Arc::new(StaticTransport::json(200, "[1,2,3]")));
        cmd_tx.send(execute(1, template(3, "{{base}}/items"))).unwrap();

        let first = events.recv().await.unwrap();
        assert!(matches!(first, ExecutionEvent::Progress { ticket: 1, bytes_received: 7 }));

        match events.recv().await.unwrap() {
            ExecutionEvent::Finished { ticket, request_id, result } => {
                assert_eq!(ticket, 1);
                assert_eq!(request_id, NodeId(3));
                assert_eq!(result.unwrap().response().unwrap().status, 200);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(lock_history(&history).len(NodeId(3)), 1);
    }

    #[tokio::test]
    async fn test_preflight_failure_is_reported_not_recorded() {
        let transport = Arc::new(StaticTransport::json(200, "{}"));
        let (cmd_tx, mut events, history) = start(transport.clone());
        cmd_tx.send(execute(1, template(3, "{{base}}/users/{{id}}"))).unwrap();

        match next_terminal(&mut events).await {
            ExecutionEvent::Finished { result: Err(ExecutionError::UnresolvedVariable { name, .. }), .. } => {
                assert_eq!(name, "id");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(transport.calls(), 0);
        assert_eq!(lock_history(&history).total_len(), 0);
    }

    #[tokio::test]
    async fn test_cancel_writes_no_history() {
        let (cmd_tx, mut events, history) = start(Arc::new(SilentTransport));
        cmd_tx.send(execute(9, template(3, "{{base}}/slow"))).unwrap();
        cmd_tx.send(ExecutionCommand::Cancel(9)).unwrap();

        let event = next_terminal(&mut events).await;
        assert!(matches!(event, ExecutionEvent::Cancelled { ticket: 9, request_id: NodeId(3) }));
        assert_eq!(lock_history(&history).total_len(), 0);
    }

    #[tokio::test]
    async fn test_cancel_only_affects_its_ticket() {
        let transport = Arc::new(GatedTransport::json(200, "{}"));
        let (cmd_tx, mut events, history) = start(transport.clone());
        cmd_tx.send(execute(1, template(3, "{{base}}/a"))).unwrap();
        cmd_tx.send(execute(2, template(3, "{{base}}/a"))).unwrap();
        cmd_tx.send(ExecutionCommand::Cancel(1)).unwrap();

        let event = next_terminal(&mut events).await;
        assert!(matches!(event, ExecutionEvent::Cancelled { ticket: 1, .. }));

        transport.release(1);
        let event = next_terminal(&mut events).await;
        assert!(matches!(event, ExecutionEvent::Finished { ticket: 2, result: Ok(_), .. }));
        assert_eq!(lock_history(&history).len(NodeId(3)), 1);
    }

    #[tokio::test]
    async fn test_repeated_runs_of_one_request_are_independent() {
        let transport = Arc::new(GatedTransport::json(204, ""));
        let (cmd_tx, mut events, history) = start(transport.clone());
        for ticket in 1..=3 {
            cmd_tx.send(execute(ticket, template(4, "{{base}}/ping"))).unwrap();
        }
        transport.release(3);

        let mut finished = Vec::new();
        while finished.len() < 3 {
            if let ExecutionEvent::Finished { ticket, .. } = next_terminal(&mut events).await {
                finished.push(ticket);
            }
        }
        finished.sort();
        assert_eq!(finished, vec![1, 2, 3]);
        assert_eq!(lock_history(&history).len(NodeId(4)), 3);
    }

    /// Holds each URL behind its own gate and answers with that URL's status
    struct RoutedTransport {
        routes: HashMap<String, (u16, tokio::sync::Semaphore)>,
    }

    impl RoutedTransport {
        fn new(routes: &[(&str, u16)]) -> Self {
            RoutedTransport {
                routes: routes
                    .iter()
                    .map(|(url, status)| (url.to_string(), (*status, tokio::sync::Semaphore::new(0))))
                    .collect(),
            }
        }

        fn release(&self, url: &str) {
            self.routes[url].1.add_permits(1);
        }
    }

    #[async_trait::async_trait]
    impl Transport for RoutedTransport {
        async fn send(
            &self,
            request: &crate::models::ResolvedRequest,
            _timeout: Duration,
            _progress: &crate::engine::transport::Progress,
        ) -> Result<crate::engine::transport::TransportResponse, crate::error::TransportError> {
            let (status, gate) = &self.routes[&request.url];
            gate.acquire().await.unwrap().forget();
            Ok(crate::engine::transport::TransportResponse {
                status: *status,
                headers: Vec::new(),
                body: Vec::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_history_follows_completion_order() {
        let slow = "https://api.example.com/slow";
        let fast = "https://api.example.com/fast";
        let transport = Arc::new(RoutedTransport::new(&[(slow, 200), (fast, 201)]));
        let (cmd_tx, mut events, history) = start(transport.clone());
        cmd_tx.send(execute(1, template(4, "{{base}}/slow"))).unwrap();
        cmd_tx.send(execute(2, template(4, "{{base}}/fast"))).unwrap();

        transport.release(fast);
        assert!(matches!(next_terminal(&mut events).await, ExecutionEvent::Finished { ticket: 2, .. }));
        transport.release(slow);
        assert!(matches!(next_terminal(&mut events).await, ExecutionEvent::Finished { ticket: 1, .. }));

        let statuses: Vec<u16> = lock_history(&history)
            .list(NodeId(4))
            .iter()
            .filter_map(|e| e.response().map(|r| r.status))
            .collect();
        // newest first: ticket 1 finished last
        assert_eq!(statuses, vec![200, 201]);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_in_flight() {
        let (cmd_tx, mut events, history) = start(Arc::new(SilentTransport));
        cmd_tx.send(execute(5, template(1, "{{base}}/hang"))).unwrap();
        cmd_tx.send(ExecutionCommand::Shutdown).unwrap();

        let event = next_terminal(&mut events).await;
        assert!(matches!(event, ExecutionEvent::Cancelled { ticket: 5, .. }));
        assert!(events.recv().await.is_none());
        assert_eq!(lock_history(&history).total_len(), 0);
    }
}
