//! Post work to the interactive thread.
//!
//! Background code never touches interactive state directly. It posts a
//! [`Job`] through a [`Poster`], and whoever owns the [`Mailbox`] (the
//! interactive loop) runs it against the state it owns.

use tokio::sync::mpsc;

type Boxed<C> = Box<dyn FnOnce(&mut C) + Send>;

/// A unit of work waiting to run on the interactive thread
pub struct Job<C>(Boxed<C>);

impl<C> Job<C> {
    /// Run the job against the interactive state
    pub fn run(self, ctx: &mut C) {
        (self.0)(ctx)
    }
}

/// Sending half, cheap to clone and safe to move to any thread
pub struct Poster<C> {
    tx: mpsc::UnboundedSender<Boxed<C>>,
}

impl<C> Clone for Poster<C> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<C> Poster<C> {
    /// Queue `job` for the interactive thread.
    ///
    /// Returns `false` if the mailbox is gone, in which case the job is dropped.
    pub fn post(&self, job: impl FnOnce(&mut C) + Send + 'static) -> bool {
        self.tx.send(Box::new(job)).is_ok()
    }
}

/// Receiving half, drained only by the interactive loop
pub struct Mailbox<C> {
    rx: mpsc::UnboundedReceiver<Boxed<C>>,
}

/// Create a connected poster/mailbox pair
pub fn channel<C>() -> (Poster<C>, Mailbox<C>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Poster { tx }, Mailbox { rx })
}

impl<C> Mailbox<C> {
    /// Wait for the next job without running it.
    ///
    /// Returns `None` once every poster has been dropped.
    pub async fn recv(&mut self) -> Option<Job<C>> {
        self.rx.recv().await.map(Job)
    }

    /// Wait for the next job and run it. Returns `false` if closed.
    pub async fn next(&mut self, ctx: &mut C) -> bool {
        match self.recv().await {
            Some(job) => {
                job.run(ctx);
                true
            }
            None => false,
        }
    }

    /// Run every job that is already queued, returning how many ran
    pub fn run_pending(&mut self, ctx: &mut C) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job(ctx);
            ran += 1;
        }
        ran
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_jobs_run_in_post_order() {
        let (poster, mut mailbox) = channel::<Vec<u32>>();
        let other = poster.clone();
        std::thread::spawn(move || {
            for i in 0..3 {
                assert!(other.post(move |v| v.push(i)));
            }
        })
        .join()
        .unwrap();
        poster.post(|v| v.push(99));

        let mut seen = Vec::new();
        assert_eq!(mailbox.run_pending(&mut seen), 4);
        assert_eq!(seen, vec![0, 1, 2, 99]);
        assert_eq!(mailbox.run_pending(&mut seen), 0);
    }

    #[tokio::test]
    async fn test_recv_defers_execution() {
        let (poster, mut mailbox) = channel::<String>();
        poster.post(|s| s.push_str("ran"));

        let mut state = String::new();
        let job = mailbox.recv().await.unwrap();
        assert!(state.is_empty());
        job.run(&mut state);
        assert_eq!(state, "ran");
    }

    #[tokio::test]
    async fn test_closed_when_posters_dropped() {
        let (poster, mut mailbox) = channel::<()>();
        drop(poster);
        assert!(!mailbox.next(&mut ()).await);
    }

    #[test]
    fn test_post_after_mailbox_dropped() {
        let (poster, mailbox) = channel::<()>();
        drop(mailbox);
        assert!(!poster.post(|_| {}));
    }
}
