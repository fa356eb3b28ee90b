// ===============================
// src/recorder.rs
// ===============================
//
// JSONL recorder untuk rekomendasi harga:
// - Tulis setiap Event ke file .jsonl (append).
// - Bufer dengan BufWriter agar hemat syscall.
// - Flush periodik tiap 1s dan/atau tiap 1000 event.
// - Otomatis membuat parent directory jika belum ada.
// - Jika tulis gagal, coba reopen file sekali dan lanjut.
//
// ENV: set `RECORD_FILE=/path/to/recommendations.jsonl` agar aktif (lihat main.rs).
//
use std::path::{Path, PathBuf};
use tokio::{
    fs::{self, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
    sync::mpsc,
    task::JoinHandle,
    time::{interval, Duration, MissedTickBehavior},
};
use tracing::{error, info};

use crate::domain::Event;

const FLUSH_EVERY_N_EVENTS: u32 = 1000;

async fn open_writer(path: &Path) -> std::io::Result<BufWriter<fs::File>> {
    // Pastikan parent directory ada (kalau ada)
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    let file = OpenOptions::new().create(true).append(true).open(path).await?;
    Ok(BufWriter::new(file))
}

async fn write_line(writer: &mut BufWriter<fs::File>, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await
}

/// Spawn task recorder. Await handle setelah semua sender di-drop agar flush terakhir selesai.
pub fn spawn(path: PathBuf) -> (mpsc::Sender<Event>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel::<Event>(8192);
    let task = tokio::spawn(run(rx, path));
    (tx, task)
}

pub async fn run(mut rx: mpsc::Receiver<Event>, path: PathBuf) {
    let mut writer = match open_writer(&path).await {
        Ok(w) => w,
        Err(e) => {
            error!(?e, path = %path.display(), "recorder: open failed, recorder disabled");
            return;
        }
    };
    info!(path = %path.display(), "recorder: started");

    let mut tick = interval(Duration::from_secs(1));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut since_last_flush: u32 = 0;

    loop {
        tokio::select! {
            maybe_ev = rx.recv() => {
                let Some(ev) = maybe_ev else {
                    // Channel closed: flush dan keluar
                    let _ = writer.flush().await;
                    info!("recorder: channel closed, stopped");
                    break;
                };

                let line = match serde_json::to_string(&ev) {
                    Ok(s) => s,
                    Err(e) => {
                        error!(?e, "recorder: serialize error, skip event");
                        continue;
                    }
                };

                if let Err(e) = write_line(&mut writer, &line).await {
                    error!(?e, "recorder: write failed, attempting reopen");
                    match open_writer(&path).await {
                        Ok(w) => writer = w,
                        Err(e2) => {
                            error!(?e2, "recorder: reopen failed, drop event");
                            continue;
                        }
                    }
                    if let Err(e2) = write_line(&mut writer, &line).await {
                        error!(?e2, "recorder: write failed again after reopen, drop event");
                        continue;
                    }
                }

                since_last_flush += 1;
                if since_last_flush >= FLUSH_EVERY_N_EVENTS {
                    let _ = writer.flush().await;
                    since_last_flush = 0;
                }
            }

            _ = tick.tick() => {
                let _ = writer.flush().await;
                since_last_flush = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn awaiting_handle_after_close_flushes_buffer() {
        let path = std::env::temp_dir()
            .join(format!("price_optima_rec_spawn_{}", std::process::id()))
            .join("events.jsonl");
        let _ = std::fs::remove_file(&path);

        let (tx, task) = spawn(path.clone());
        for i in 0..10 {
            tx.send(Event::Note(format!("n{i}"))).await.unwrap();
        }
        drop(tx);
        task.await.unwrap();

        // tanpa menunggu tick 1s: isi harus sudah ada di disk
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 10);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn writes_one_json_line_per_event() {
        let path = std::env::temp_dir()
            .join(format!("price_optima_rec_{}", std::process::id()))
            .join("events.jsonl");
        let _ = std::fs::remove_file(&path);

        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(run(rx, path.clone()));
        tx.send(Event::Note("first".into())).await.unwrap();
        tx.send(Event::Note("second".into())).await.unwrap();
        drop(tx);
        task.await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let ev: Event = serde_json::from_str(lines[1]).unwrap();
        assert!(matches!(ev, Event::Note(s) if s == "second"));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
