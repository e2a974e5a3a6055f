//! Parallel Resource Table Construction
//!
//! The only legitimate parallelism in the core: palette, colormap, sprite
//! lookup and texture-animation tables are independent, read-only views of
//! an already-parsed archive, so they may be built concurrently. All builds
//! join before the simulation starts a single tic.
//!
//! Missing optional tables degrade to empty values; nothing here can fail
//! a load.

use std::thread;

use tracing::warn;

use super::lump::{LumpStore, TextureLookup};

/// One animation sequence: frames cycle from `first` to `last`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Animation {
    /// First frame name.
    pub first: String,
    /// Last frame name.
    pub last: String,
    /// True for wall textures, false for flats.
    pub is_texture: bool,
}

/// Read-only tables shared by every subsystem after load.
#[derive(Debug, Default, Clone)]
pub struct ResourceTables {
    /// 256 RGB triples from the base palette.
    pub palette: Vec<[u8; 3]>,
    /// Raw light-diminishing colormap bytes.
    pub colormap: Vec<u8>,
    /// Sprite lump names between the sprite markers, in archive order.
    pub sprite_names: Vec<String>,
    /// Animation sequences whose first frame exists in this archive.
    pub animations: Vec<Animation>,
}

/// Built-in animation sequences; entries whose content is absent from the
/// archive are dropped at build time.
const FLAT_ANIMS: &[(&str, &str)] = &[
    ("NUKAGE1", "NUKAGE3"),
    ("FWATER1", "FWATER4"),
    ("SWATER1", "SWATER4"),
    ("LAVA1", "LAVA4"),
    ("BLOOD1", "BLOOD3"),
];

const TEXTURE_ANIMS: &[(&str, &str)] = &[
    ("BLODGR1", "BLODGR4"),
    ("SLADRIP1", "SLADRIP3"),
    ("BLODRIP1", "BLODRIP4"),
    ("FIREWALA", "FIREWALL"),
    ("FIRELAV3", "FIRELAVA"),
];

/// Build all resource tables concurrently against the read-only store,
/// joining before return.
pub fn preload_tables(
    store: &(dyn LumpStore + Sync),
    textures: &(dyn TextureLookup + Sync),
) -> ResourceTables {
    thread::scope(|scope| {
        let palette = scope.spawn(|| build_palette(store));
        let colormap = scope.spawn(|| build_colormap(store));
        let sprites = scope.spawn(|| build_sprite_names(store));
        let animations = scope.spawn(|| build_animations(store, textures));

        // Scoped threads cannot outlive this block; a panic in a builder is
        // a programming error and propagates.
        ResourceTables {
            palette: palette.join().expect("palette builder"),
            colormap: colormap.join().expect("colormap builder"),
            sprite_names: sprites.join().expect("sprite builder"),
            animations: animations.join().expect("animation builder"),
        }
    })
}

fn build_palette(store: &dyn LumpStore) -> Vec<[u8; 3]> {
    let Some(index) = store.index_of("PLAYPAL") else {
        warn!("no palette lump");
        return Vec::new();
    };
    store.bytes_of(index)
        .chunks_exact(3)
        .take(256)
        .map(|c| [c[0], c[1], c[2]])
        .collect()
}

fn build_colormap(store: &dyn LumpStore) -> Vec<u8> {
    match store.index_of("COLORMAP") {
        Some(index) => store.bytes_of(index).to_vec(),
        None => {
            warn!("no colormap lump");
            Vec::new()
        }
    }
}

/// Sprite names are the lumps between the S_START and S_END markers.
fn build_sprite_names(store: &dyn LumpStore) -> Vec<String> {
    let (Some(start), Some(end)) = (store.index_of("S_START"), store.index_of("S_END")) else {
        return Vec::new();
    };
    if start + 1 > end {
        warn!("inverted sprite markers");
        return Vec::new();
    }
    (start + 1..end).map(|i| store.name_of(i).to_string()).collect()
}

fn build_animations(
    store: &dyn LumpStore,
    textures: &dyn TextureLookup,
) -> Vec<Animation> {
    let mut animations = Vec::new();
    for (first, last) in FLAT_ANIMS {
        if textures.flat_index(first).is_some() || store.index_of(first).is_some() {
            animations.push(Animation {
                first: (*first).into(),
                last: (*last).into(),
                is_texture: false,
            });
        }
    }
    for (first, last) in TEXTURE_ANIMS {
        if textures.texture_index(first).is_some() {
            animations.push(Animation {
                first: (*first).into(),
                last: (*last).into(),
                is_texture: true,
            });
        }
    }
    animations
}

// =============================================================================
// TESTS
// =============================================================================
