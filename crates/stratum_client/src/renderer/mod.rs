pub mod headless;
pub mod mesh;

/// Device side of chunk rendering.
///
/// Builds are asynchronous: `build_mesh` returns at once and the handle becomes ready
/// later, which callers observe by polling `is_ready`. Chunks and the chunk manager only
/// ever talk to this trait.
pub trait RenderBackend: Send + Sync {
    type Handle: Clone + Send + Sync;

    /// Submits interleaved `position.xyz, uv.xy, light` vertices and triangle indices.
    fn build_mesh(&self, vertices: &[f32], indices: &[u32]) -> Self::Handle;

    fn is_ready(&self, handle: &Self::Handle) -> bool;

    /// Frees a handle once no in-flight frame can still reference it.
    fn release(&self, handle: Self::Handle);

    fn gather_ready<'a>(
        &self,
        handles: &mut dyn Iterator<Item = &'a Self::Handle>,
    ) -> Vec<Self::Handle>
    where
        Self::Handle: 'a,
    {
        handles
            .filter(|handle| self.is_ready(handle))
            .cloned()
            .collect()
    }
}
