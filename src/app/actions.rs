#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    ListUp,
    ListDown,
    GoTop,
    GoBottom,

    /// Pointer moved onto a row.
    PointerAt(usize),
    /// Pointer left the list.
    PointerOut,

    /// Tap on a mobile poster.
    Activate,
    Retry,
    ReloadAll,
    RefreshUrl,
    /// Re-read the manifest and apply changed sources in place.
    ReloadManifest,
    ToggleHelp,

    Resize,
}
