// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

/*!
    # Purpose
    The *soft-compositor* crate mixes the raw video of multiple conference
    participants into one or more composed output streams, entirely in
    software. Each participant pushes decoded [I420](https://en.wikipedia.org/wiki/Chroma_subsampling)
    frames into a bounded per-input queue; timer-driven *frame generators*
    periodically compose the current layout onto a canvas and deliver the
    result to every registered destination.

    - [SoftVideoCompositor]
      owns the inputs, the avatar cache and the generators and routes all
      configuration and media calls between them.
    - [SoftInput]
      is the bounded, synchronized frame queue of one participant.
    - [SoftFrameGenerator]
      composes output frames on its own timer and supports a quantized family
      of frame rates derived from one master tick.
    - [AvatarManager]
      substitutes a static placeholder image for inactive participants.

    # Frames & Buffers

    All pixel data is planar I420. Composed canvases and queued input frames
    are carved out of bounded [I420BufferManager] pools and travel as
    reference-counted [PooledBuffer] handles which return to their pool when
    the last holder drops them.

    # Layouts

    A [LayoutSolution] assigns input indices to canvas rectangles expressed in
    fractional [Rational] coordinates, so the same description fits any canvas
    size. Later entries paint over earlier ones. Depending on the compositor's
    fit mode a region is either center-cropped to fill its rectangle or
    letterboxed inside it.

    # Synchronization

    Inputs whose upstream supplies cross-stream sync timestamps are advanced
    together: each composition picks the latest timestamp common to all
    sync-capable queues and every region displays a frame at or past it.

    # Outputs

    Destinations implement the single-capability [FrameDestination] trait and
    are registered per resolution and frame rate with [SoftVideoCompositor::add_output].
    Registration stores a non-owning handle; a destination dropped by its
    owner is skipped at dispatch time.

    # Overlays

    A text overlay is drawn onto every composed canvas through the
    [OverlayRenderer] collaborator. The built-in renderer is a placeholder;
    deployments plug their own.
*/

#![allow(clippy::module_name_repetitions)]

#[macro_use]
extern crate log;

mod frame;
pub mod layout;
mod mixer;
mod overlays;
mod sinks;

#[cfg(test)]
mod tests;

pub use frame::*;
pub use layout::*;
pub use mixer::*;
pub use overlays::*;
pub use sinks::*;

#[cfg(test)]
pub use tests::testing;
