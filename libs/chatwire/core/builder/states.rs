/// Type-state markers for the builder pattern
///
/// These types track at compile time whether an address has been given,
/// so `build()` cannot be called on an incomplete builder.

use std::marker::PhantomData;

/// Marker trait for address state
pub trait AddressState {}

/// Address has not been set
pub struct NoAddress;
impl AddressState for NoAddress {}

/// Address has been set
pub struct HasAddress;
impl AddressState for HasAddress {}

/// Phantom marker to prevent direct construction
#[derive(Debug, Clone, Copy)]
pub struct TypeState<A> {
    _address: PhantomData<A>,
}

impl<A> TypeState<A> {
    pub(crate) fn new() -> Self {
        Self {
            _address: PhantomData,
        }
    }
}

impl<A> Default for TypeState<A> {
    fn default() -> Self {
        Self::new()
    }
}
