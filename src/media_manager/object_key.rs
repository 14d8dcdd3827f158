//! Time-ordered object keys for rehosted media.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// Hands out `YYYYMMDD-HHMMSS-NNNN.ext` keys.
///
/// `NNNN` counts up within one UTC second and starts over at `0001` when the
/// second changes, so keys from one generator are unique and sort in
/// generation order.
#[derive(Debug, Default)]
pub struct ObjectKeyGenerator {
    state: Mutex<(i64, u32)>,
}

impl ObjectKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_key(&self, extension: &str) -> String {
        self.next_key_at(Utc::now(), extension)
    }

    pub fn next_key_at(&self, now: DateTime<Utc>, extension: &str) -> String {
        let second = now.timestamp();
        let counter = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if state.0 == second {
                state.1 += 1;
            } else {
                *state = (second, 1);
            }
            state.1
        };
        format!(
            "{}-{:04}.{}",
            now.format("%Y%m%d-%H%M%S"),
            counter,
            extension
        )
    }
}

/// Lower-cased extension of a remote file path, if it has one.
pub fn path_extension(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Content type for well-known Telegram file extensions.
pub fn content_type_for_extension(extension: &str) -> Option<&'static str> {
    let content_type = match extension {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "oga" | "ogg" => "audio/ogg",
        "tgs" => "application/x-tgsticker",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "txt" => "text/plain",
        _ => return None,
    };
    Some(content_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_keys_within_one_second_increase() {
        let generator = ObjectKeyGenerator::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();

        let keys: Vec<String> = (0..3).map(|_| generator.next_key_at(now, "jpg")).collect();
        assert_eq!(
            keys,
            vec![
                "20240309-070501-0001.jpg",
                "20240309-070501-0002.jpg",
                "20240309-070501-0003.jpg",
            ]
        );
        assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_counter_resets_on_new_second() {
        let generator = ObjectKeyGenerator::new();
        let first = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).unwrap();

        generator.next_key_at(first, "png");
        generator.next_key_at(first, "png");
        assert_eq!(generator.next_key_at(second, "png"), "20240309-070502-0001.png");
    }

    #[test]
    fn test_keys_are_unique_across_threads() {
        let generator = std::sync::Arc::new(ObjectKeyGenerator::new());
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let generator = generator.clone();
                std::thread::spawn(move || {
                    (0..25)
                        .map(|_| generator.next_key_at(now, "bin"))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut keys: Vec<String> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), 100);
    }

    #[test]
    fn test_path_extension() {
        assert_eq!(path_extension("photos/file_12.JPG"), Some("jpg".to_string()));
        assert_eq!(path_extension("stickers/file_3.webp"), Some("webp".to_string()));
        assert_eq!(path_extension("documents/README"), None);
    }

    #[test]
    fn test_content_type_for_extension() {
        assert_eq!(content_type_for_extension("oga"), Some("audio/ogg"));
        assert_eq!(content_type_for_extension("xyz"), None);
    }
}
