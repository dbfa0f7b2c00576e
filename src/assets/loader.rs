use super::{load_env_map, load_model, AssetError, EnvMap, LoadedModel};
use crate::environment::{EnvMapSource, LoadTicket};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;

/// Completed load, delivered on the main thread by [`AssetLoader::poll`].
#[derive(Debug)]
pub enum LoadEvent {
    EnvMap {
        ticket: LoadTicket,
        result: Result<Arc<EnvMap>, AssetError>,
    },
    Model {
        path: PathBuf,
        result: Result<Arc<LoadedModel>, AssetError>,
    },
}

/// Decodes assets on worker threads. Nothing is cancelled; every request
/// produces exactly one event.
pub struct AssetLoader {
    root: PathBuf,
    sender: Sender<LoadEvent>,
    receiver: Receiver<LoadEvent>,
}

impl AssetLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let (sender, receiver) = channel();
        Self {
            root: root.into(),
            sender,
            receiver,
        }
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    pub fn request_model(&mut self, path: &Path) {
        let full_path = self.resolve(path);
        log::info!("Loading model {}", full_path.display());
        let sender = self.sender.clone();
        let event_path = full_path.clone();
        let spawned = thread::Builder::new()
            .name("asset-model".to_string())
            .spawn(move || {
                let result = load_model(&full_path).map(Arc::new);
                let _ = sender.send(LoadEvent::Model {
                    path: full_path,
                    result,
                });
            });
        if let Err(source) = spawned {
            let _ = self.sender.send(LoadEvent::Model {
                path: event_path,
                result: Err(AssetError::Spawn(source)),
            });
        }
    }

    /// Drain every completion that arrived since the last call.
    pub fn poll(&mut self) -> Vec<LoadEvent> {
        self.receiver.try_iter().collect()
    }
}

impl EnvMapSource for AssetLoader {
    fn request_env_map(&mut self, ticket: LoadTicket, path: &Path) {
        let full_path = self.resolve(path);
        log::info!(
            "Loading env map {} for {} (generation {})",
            full_path.display(),
            ticket.mode.label(),
            ticket.generation
        );
        let sender = self.sender.clone();
        let spawned = thread::Builder::new()
            .name(format!("asset-envmap-{}", ticket.generation))
            .spawn(move || {
                let result = load_env_map(&full_path).map(Arc::new);
                let _ = sender.send(LoadEvent::EnvMap { ticket, result });
            });
        if let Err(source) = spawned {
            let _ = self.sender.send(LoadEvent::EnvMap {
                ticket,
                result: Err(AssetError::Spawn(source)),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::EnvironmentMode;
    use image::codecs::hdr::HdrEncoder;
    use image::Rgb;
    use std::time::{Duration, Instant};

    fn wait_for_events(loader: &mut AssetLoader, count: usize) -> Vec<LoadEvent> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut events = Vec::new();
        while events.len() < count && Instant::now() < deadline {
            events.extend(loader.poll());
            thread::sleep(Duration::from_millis(5));
        }
        events
    }

    #[test]
    fn env_map_request_decodes_on_worker() {
        let mut root = std::env::temp_dir();
        root.push(format!("envmap_viewer_loader_{}", std::process::id()));
        std::fs::create_dir_all(&root).unwrap();
        let file = std::fs::File::create(root.join("tiny.hdr")).unwrap();
        let pixels = vec![Rgb([0.5f32, 1.0, 2.0]); 4 * 2];
        HdrEncoder::new(file).encode(&pixels, 4, 2).unwrap();

        let mut loader = AssetLoader::new(&root);
        let ticket = LoadTicket {
            generation: 7,
            mode: EnvironmentMode::LightStudio,
        };
        loader.request_env_map(ticket, Path::new("tiny.hdr"));

        let events = wait_for_events(&mut loader, 1);
        match &events[..] {
            [LoadEvent::EnvMap { ticket: got, result }] => {
                assert_eq!(*got, ticket);
                let map = result.as_ref().unwrap();
                assert_eq!((map.width(), map.height()), (4, 2));
            }
            other => panic!("unexpected events {other:?}"),
        }

        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn missing_files_report_errors() {
        let mut loader = AssetLoader::new(std::env::temp_dir().join("envmap_viewer_missing"));
        loader.request_env_map(
            LoadTicket {
                generation: 1,
                mode: EnvironmentMode::Field1,
            },
            Path::new("nope.hdr"),
        );
        loader.request_model(Path::new("nope.glb"));

        let events = wait_for_events(&mut loader, 2);
        assert_eq!(events.len(), 2);
        for event in events {
            match event {
                LoadEvent::EnvMap { result, .. } => {
                    assert!(matches!(result, Err(AssetError::Read { .. })))
                }
                LoadEvent::Model { result, .. } => {
                    assert!(matches!(result, Err(AssetError::Gltf { .. })))
                }
            }
        }
    }
}
