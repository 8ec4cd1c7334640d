pub trait WorkerInvoker {
    fn invoke_worker_async(&self, payload: &[u8]) -> Result<(), String>;
}
