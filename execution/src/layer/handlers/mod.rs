pub(super) mod placement;
pub(super) mod settlement;
