//! Native file dialogs behind a trait so the shell can be driven without a
//! desktop session.

use std::{future::Future, path::PathBuf};

/// Extensions offered by the image picker.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "dicom"];

pub trait FileDialogs: Send + Sync {
    /// Multi-select image picker. Empty when cancelled.
    fn pick_images(&self) -> impl Future<Output = Vec<PathBuf>> + Send;
    /// Single image picker for the single-image view.
    fn pick_image(&self) -> impl Future<Output = Option<PathBuf>> + Send;
    /// Save dialog for exported results. `None` when cancelled.
    fn save_results_path(
        &self,
        default_path: PathBuf,
    ) -> impl Future<Output = Option<PathBuf>> + Send;
}

#[cfg(feature = "gui")]
pub use native::NativeDialogs;

#[cfg(feature = "gui")]
mod native {
    use std::path::PathBuf;

    use rfd::AsyncFileDialog;

    use super::{FileDialogs, IMAGE_EXTENSIONS};

    #[derive(Debug, Clone, Copy, Default)]
    pub struct NativeDialogs;

    impl FileDialogs for NativeDialogs {
        async fn pick_images(&self) -> Vec<PathBuf> {
            AsyncFileDialog::new()
                .set_title("Select MRI/CT Images")
                .add_filter("Images", IMAGE_EXTENSIONS)
                .pick_files()
                .await
                .map(|files| files.iter().map(|f| f.path().to_path_buf()).collect())
                .unwrap_or_default()
        }

        async fn pick_image(&self) -> Option<PathBuf> {
            AsyncFileDialog::new()
                .set_title("Select Image")
                .add_filter("Images", IMAGE_EXTENSIONS)
                .pick_file()
                .await
                .map(|f| f.path().to_path_buf())
        }

        async fn save_results_path(&self, default_path: PathBuf) -> Option<PathBuf> {
            let mut dialog = AsyncFileDialog::new()
                .set_title("Save Detection Results")
                .add_filter("JSON", &["json"]);
            if let Some(dir) = default_path.parent() {
                dialog = dialog.set_directory(dir);
            }
            if let Some(name) = default_path.file_name() {
                dialog = dialog.set_file_name(name.to_string_lossy());
            }
            dialog.save_file().await.map(|f| f.path().to_path_buf())
        }
    }
}
