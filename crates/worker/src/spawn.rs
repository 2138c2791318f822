use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::TaskClass;

fn runtime_handle() -> tokio::runtime::Handle {
	if let Ok(handle) = tokio::runtime::Handle::try_current() {
		return handle;
	}

	static GLOBAL_RT: OnceLock<tokio::runtime::Runtime> = OnceLock::new();
	let runtime = GLOBAL_RT.get_or_init(|| {
		tokio::runtime::Builder::new_multi_thread()
			.enable_all()
			.worker_threads(1)
			.thread_name("herald-worker-global")
			.build()
			.expect("failed to build herald-worker global tokio runtime")
	});
	runtime.handle().clone()
}

/// Spawns an async task with worker classification metadata.
pub fn spawn<F>(class: TaskClass, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tracing::trace!(worker_class = class.as_str(), "worker.spawn");
	runtime_handle().spawn(fut)
}

/// Spawns `fut` to start once `delay` has elapsed.
///
/// The delay is a one-shot timer; nothing is retried or rescheduled.
pub fn spawn_after<F>(class: TaskClass, delay: Duration, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tracing::trace!(worker_class = class.as_str(), delay_ms = delay.as_millis() as u64, "worker.spawn_after");
	runtime_handle().spawn(async move {
		tokio::time::sleep(delay).await;
		fut.await
	})
}
