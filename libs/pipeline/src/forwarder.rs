use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use relay_api::{Codec, Framing, RawRecord, RelayError, Transport, TransportStream};

// ═══════════════════════════════════════════════════════════════
//  TopicSampler — 1 из N на topic
// ═══════════════════════════════════════════════════════════════

/// Счётчики записей по topic'ам. Пропускает каждую `every`-ю запись
/// каждого topic'а независимо от остальных; счётчики не сбрасываются.
#[derive(Debug)]
pub struct TopicSampler {
    every: u64,
    counts: HashMap<String, u64>,
}

impl TopicSampler {
    pub fn new(every: u64) -> Self {
        Self { every: every.max(1), counts: HashMap::new() }
    }

    /// Учесть запись; `true`, если она должна уйти дальше.
    pub fn admit(&mut self, topic: &str) -> bool {
        let count = match self.counts.get_mut(topic) {
            Some(c) => {
                *c += 1;
                *c
            }
            None => {
                self.counts.insert(topic.to_owned(), 1);
                1
            }
        };
        count % self.every == 0
    }

    pub fn count(&self, topic: &str) -> u64 {
        self.counts.get(topic).copied().unwrap_or(0)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Forwarder — queue → sampler → codec → framing → transport
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwarderStats {
    /// Записи, извлечённые из очереди.
    pub consumed: u64,
    /// Записи, успешно записанные в соединение.
    pub relayed: u64,
    pub write_failures: u64,
    pub connects: u64,
}

/// Отправка downsampled записей в relay target с переподключением.
///
/// Disconnected: connect, при неудаче пауза `retry` и снова.
/// Connected: ждём запись не дольше `poll`; ошибка записи закрывает
/// соединение, запись не повторяется.
pub struct Forwarder {
    transport: Box<dyn Transport>,
    codec: Arc<dyn Codec>,
    framing: Arc<dyn Framing>,
    sampler: TopicSampler,
    retry: Duration,
    poll: Duration,
}

impl Forwarder {
    pub fn new(
        transport: Box<dyn Transport>,
        codec: Arc<dyn Codec>,
        framing: Arc<dyn Framing>,
        every: u64,
        retry: Duration,
        poll: Duration,
    ) -> Self {
        Self { transport, codec, framing, sampler: TopicSampler::new(every), retry, poll }
    }

    /// Работает до закрытия очереди (в состоянии Connected) или до отмены.
    pub async fn run(mut self, mut rx: mpsc::Receiver<RawRecord>, token: CancellationToken) -> ForwarderStats {
        let target = self.transport.target();
        let mut stats = ForwarderStats::default();
        let mut conn: Option<Box<dyn TransportStream>> = None;
        let mut wire = Vec::with_capacity(256);

        loop {
            let stream = match conn.as_mut() {
                Some(stream) => stream,
                None => {
                    match self.transport.connect().await {
                        Ok(stream) => {
                            stats.connects += 1;
                            tracing::info!(%target, peer = %stream.peer_info(), "connected to relay target");
                            conn = Some(stream);
                        }
                        Err(e) => {
                            tracing::debug!(%target, error = ?e, "connect failed, retrying");
                            tokio::select! {
                                _ = tokio::time::sleep(self.retry) => {}
                                _ = token.cancelled() => break,
                            }
                        }
                    }
                    continue;
                }
            };

            let record = tokio::select! {
                polled = tokio::time::timeout(self.poll, rx.recv()) => match polled {
                    Ok(Some(record)) => record,
                    Ok(None) => break,
                    Err(_) => continue,
                },
                _ = token.cancelled() => break,
            };
            stats.consumed += 1;

            if !self.sampler.admit(&record.topic) {
                continue;
            }

            wire.clear();
            if let Err(e) = self.encode(&record, &mut wire) {
                tracing::error!(topic = %record.topic, error = ?e, "encode error, skipping");
                continue;
            }

            match write_frame(stream.as_mut(), &wire).await {
                Ok(()) => {
                    stats.relayed += 1;
                    tracing::info!(topic = %record.topic, payload = %record.payload, "published");
                }
                Err(e) => {
                    stats.write_failures += 1;
                    tracing::warn!(%target, error = %e, "write failed, reconnecting");
                    conn = None;
                }
            }
        }

        if let Some(mut stream) = conn {
            let _ = stream.shutdown().await;
        }
        tracing::info!(
            %target,
            consumed = stats.consumed,
            relayed = stats.relayed,
            write_failures = stats.write_failures,
            "forwarder stopped"
        );
        stats
    }

    fn encode(&self, record: &RawRecord, wire: &mut Vec<u8>) -> Result<(), RelayError> {
        let body = self.codec.encode(record)?;
        self.framing.encode(&body, wire)
    }
}

async fn write_frame(stream: &mut dyn TransportStream, wire: &[u8]) -> std::io::Result<()> {
    stream.write_all(wire).await?;
    stream.flush().await
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use codec_json::JsonCodec;
    use framing_lines::LinesFraming;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::UnixListener;
    use transport_unix_client::UnixClientTransport;

    use super::*;

    fn forwarder(path: &Path, every: u64) -> Forwarder {
        Forwarder::new(
            Box::new(UnixClientTransport::new(path)),
            Arc::new(JsonCodec),
            Arc::new(LinesFraming::default()),
            every,
            Duration::from_millis(10),
            Duration::from_millis(1),
        )
    }

    async fn read_lines(stream: tokio::net::UnixStream) -> Vec<String> {
        let mut lines = BufReader::new(stream).lines();
        let mut out = Vec::new();
        while let Ok(Some(line)) = lines.next_line().await {
            out.push(line);
        }
        out
    }

    #[test]
    fn sampler_counts_topics_independently() {
        let mut sampler = TopicSampler::new(10);
        let mut admitted = Vec::new();
        // rpm приходит каждой третьей записью, water — остальными
        for i in 1..=30 {
            let topic = if i % 3 == 0 { "rpm" } else { "water" };
            if sampler.admit(topic) {
                admitted.push((i, topic));
            }
        }
        assert_eq!(admitted, [(14, "water"), (29, "water"), (30, "rpm")]);
        assert_eq!(sampler.count("water"), 20);
        assert_eq!(sampler.count("rpm"), 10);
        assert_eq!(sampler.count("temp"), 0);
    }

    #[tokio::test]
    async fn relays_every_tenth_record_per_topic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let (tx, rx) = mpsc::channel(64);
        for i in 1..=10 {
            tx.send(RawRecord::new("water", format!("{{\"t\":{i}}}"))).await.unwrap();
            tx.send(RawRecord::new("rpm", format!("{{\"r\":{i}}}"))).await.unwrap();
        }
        drop(tx);

        let handle = tokio::spawn(forwarder(&path, 10).run(rx, CancellationToken::new()));
        let (stream, _) = listener.accept().await.unwrap();
        let stats = handle.await.unwrap();
        let lines = read_lines(stream).await;

        assert_eq!(
            lines,
            [
                r#"{"topic":"water","payload":"{\"t\":10}"}"#,
                r#"{"topic":"rpm","payload":"{\"r\":10}"}"#,
            ]
        );
        assert_eq!(stats.consumed, 20);
        assert_eq!(stats.relayed, 2);
        assert_eq!(stats.connects, 1);
    }

    #[tokio::test]
    async fn connects_once_target_appears() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late.sock");
        let (tx, rx) = mpsc::channel(8);
        let token = CancellationToken::new();
        let handle = tokio::spawn(forwarder(&path, 1).run(rx, token.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        let listener = UnixListener::bind(&path).unwrap();
        let (stream, _) = tokio::time::timeout(Duration::from_secs(2), listener.accept())
            .await
            .unwrap()
            .unwrap();

        tx.send(RawRecord::new("water", "1")).await.unwrap();
        drop(tx);
        let stats = handle.await.unwrap();

        assert_eq!(read_lines(stream).await, [r#"{"topic":"water","payload":"1"}"#]);
        assert_eq!(stats.connects, 1);
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn late_target_resumes_on_next_tenth_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late10.sock");

        // Пока target нет, forwarder не читает очередь: 1..=5 ждут в ней,
        // 6..=12 отброшены на переполнении, как это делает reader.
        let (tx, rx) = mpsc::channel(5);
        let mut dropped = Vec::new();
        for i in 1..=12 {
            if tx.try_send(RawRecord::new("water", i.to_string())).is_err() {
                dropped.push(i);
            }
        }
        assert_eq!(dropped, (6..=12).collect::<Vec<_>>());

        let handle = tokio::spawn(forwarder(&path, 10).run(rx, CancellationToken::new()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        let listener = UnixListener::bind(&path).unwrap();
        let (stream, _) = tokio::time::timeout(Duration::from_secs(2), listener.accept())
            .await
            .unwrap()
            .unwrap();

        for i in 13..=30 {
            tx.send(RawRecord::new("water", i.to_string())).await.unwrap();
        }
        drop(tx);
        let stats = handle.await.unwrap();

        // Счёт идёт только по извлечённым записям: 10-я — "18", 20-я — "28"
        assert_eq!(
            read_lines(stream).await,
            [r#"{"topic":"water","payload":"18"}"#, r#"{"topic":"water","payload":"28"}"#]
        );
        assert_eq!(stats.consumed, 23);
        assert_eq!(stats.relayed, 2);
        assert_eq!(stats.connects, 1);
    }

    #[tokio::test]
    async fn cancel_stops_retry_loop() {
        let dir = tempfile::tempdir().unwrap();
        let (_tx, rx) = mpsc::channel(8);
        let token = CancellationToken::new();
        let handle = tokio::spawn(forwarder(&dir.path().join("absent.sock"), 10).run(rx, token.clone()));

        tokio::time::sleep(Duration::from_millis(30)).await;
        token.cancel();
        let stats = tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        assert_eq!(stats.connects, 0);
        assert_eq!(stats.consumed, 0);
    }

    #[tokio::test]
    async fn write_failure_drops_record_and_reconnects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flaky.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(forwarder(&path, 1).run(rx, CancellationToken::new()));

        // Первое соединение принимаем и сразу закрываем
        let (first, _) = listener.accept().await.unwrap();
        drop(first);
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Запись в закрытый сокет может пройти до того, как ядро сообщит EPIPE;
        // шлём, пока forwarder не переподключится.
        let accept = tokio::spawn(async move { listener.accept().await.map(|(s, _)| s) });
        let mut sent = 0;
        while !accept.is_finished() && sent < 100 {
            sent += 1;
            tx.send(RawRecord::new("a", format!("lost-{sent}"))).await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let second = accept.await.unwrap().unwrap();

        tx.send(RawRecord::new("a", "after")).await.unwrap();
        drop(tx);
        let stats = handle.await.unwrap();
        let lines = read_lines(second).await;

        assert_eq!(stats.connects, 2);
        assert!(stats.write_failures >= 1);
        assert_eq!(lines.last().map(String::as_str), Some(r#"{"topic":"a","payload":"after"}"#));
        assert!(lines.iter().all(|l| !l.contains("lost-1\"")));
    }
}
