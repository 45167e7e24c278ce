pub mod compile;
pub mod h3d;
pub mod options;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rootcause::Report;
use tracing::{info, warn};

pub use self::compile::compile_scene;
pub use self::h3d::write_asset;
pub use self::options::ExportOptions;
use crate::error::{ErrorKind, H3dResult};
use crate::models::H3dAsset;
use crate::scene::SceneProvider;

/// Compile `scene` and write it to `path`.
///
/// The asset is fully compiled before the file is created, so a scene error
/// leaves no file behind. A failed write removes the partial file.
pub fn export_to_path<S: SceneProvider + ?Sized>(
    scene: &S,
    options: &ExportOptions,
    path: &Path,
) -> H3dResult<H3dAsset> {
    let asset = compile_scene(scene, options)?;

    let file = File::create(path).map_err(|e| Report::new(ErrorKind::from(e)))?;
    let mut writer = BufWriter::new(file);
    let written = write_asset(&asset, options.textual, &mut writer).and_then(|()| writer.flush());
    if let Err(e) = written {
        drop(writer);
        if let Err(remove) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %remove, "could not remove partial output");
        }
        return Err(Report::new(ErrorKind::from(e)));
    }

    info!(path = %path.display(), textual = options.textual, "wrote asset");
    Ok(asset)
}
