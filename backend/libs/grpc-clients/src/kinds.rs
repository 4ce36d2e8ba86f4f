//! Downstream service kinds and their pools
//!
//! Each kind is an uninhabited marker type. `ClientPools` owns one
//! `ConnectionPool<ServiceClient<K>>` per kind, so a gateway endpoint and a
//! storage-provider endpoint never share a cache entry even when the address
//! is the same.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::config::ChannelSettings;
use crate::pool::{ConnectionPool, PooledClient};
use crate::trace::TracedChannel;
use crate::PoolError;

/// A kind of downstream service reachable through the pools
pub trait ServiceKind: Sized + Send + Sync + 'static {
    /// Stable name used in logs and spans
    const NAME: &'static str;

    fn pool(pools: &ClientPools) -> &ConnectionPool<ServiceClient<Self>>;
}

/// Pooled channel handle for service kind `K`
///
/// Wrap it in a generated tonic client with [`ServiceClient::into_client`]:
///
/// ```ignore
/// let stub = pools
///     .storage_provider("storage-1:9142")
///     .await?
///     .into_client(|ch, max| ProviderApiClient::new(ch).max_decoding_message_size(max));
/// ```
pub struct ServiceClient<K> {
    channel: TracedChannel,
    max_decoding_message_size: usize,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Clone for ServiceClient<K> {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
            max_decoding_message_size: self.max_decoding_message_size,
            _kind: PhantomData,
        }
    }
}

impl<K: ServiceKind> fmt::Debug for ServiceClient<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceClient")
            .field("kind", &K::NAME)
            .field("max_decoding_message_size", &self.max_decoding_message_size)
            .finish()
    }
}

impl<K> ServiceClient<K> {
    pub fn channel(&self) -> TracedChannel {
        self.channel.clone()
    }

    pub fn max_decoding_message_size(&self) -> usize {
        self.max_decoding_message_size
    }

    /// Build a typed client over the shared channel
    pub fn into_client<T>(self, build: impl FnOnce(TracedChannel, usize) -> T) -> T {
        build(self.channel, self.max_decoding_message_size)
    }
}

impl<K: ServiceKind> PooledClient for ServiceClient<K> {
    fn from_channel(channel: TracedChannel, settings: &ChannelSettings) -> Self {
        Self {
            channel,
            max_decoding_message_size: settings.max_decoding_message_size,
            _kind: PhantomData,
        }
    }
}

macro_rules! service_kinds {
    ($($(#[$doc:meta])* $kind:ident => $field:ident, $name:literal;)+) => {
        $(
            $(#[$doc])*
            #[derive(Debug)]
            pub enum $kind {}

            impl ServiceKind for $kind {
                const NAME: &'static str = $name;

                fn pool(pools: &ClientPools) -> &ConnectionPool<ServiceClient<Self>> {
                    &pools.$field
                }
            }
        )+

        /// One lazily-populated pool per downstream service kind
        pub struct ClientPools {
            $($field: ConnectionPool<ServiceClient<$kind>>,)+
        }

        impl ClientPools {
            pub fn new(settings: ChannelSettings) -> Self {
                let settings = Arc::new(settings);
                Self {
                    $($field: ConnectionPool::new($name, settings.clone()),)+
                }
            }

            $(
                pub async fn $field(&self, endpoint: &str) -> Result<ServiceClient<$kind>, PoolError> {
                    self.$field.get(endpoint).await
                }
            )+

            /// Endpoints cached across all kinds
            pub fn len(&self) -> usize {
                0 $(+ self.$field.len())+
            }

            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }
        }
    };
}

service_kinds! {
    /// API gateway
    Gateway => gateway, "gateway";
    AuthRegistry => auth_registry, "authregistry";
    AuthProvider => auth_provider, "authprovider";
    UserProvider => user_provider, "userprovider";
    GroupProvider => group_provider, "groupprovider";
    /// Resolves references to the provider holding them
    StorageRegistry => storage_registry, "storageregistry";
    StorageProvider => storage_provider, "storageprovider";
    AppRegistry => app_registry, "appregistry";
    AppProvider => app_provider, "appprovider";
    PublicShareProvider => public_share_provider, "publicshareprovider";
    UserShareProvider => user_share_provider, "usershareprovider";
    OcmShareProvider => ocm_share_provider, "ocmshareprovider";
    /// Decides which remote federation members are trusted
    OcmProviderAuthorizer => ocm_provider_authorizer, "ocmproviderauthorizer";
    OcmInviteManager => ocm_invite_manager, "ocminvitemanager";
    OcmCore => ocm_core, "ocmcore";
    Preferences => preferences, "preferences";
    Permissions => permissions, "permissions";
    /// Third-party data transfers
    DataTx => data_tx, "datatx";
}

impl ClientPools {
    /// Get the client for kind `K` at `endpoint`
    pub async fn get<K: ServiceKind>(&self, endpoint: &str) -> Result<ServiceClient<K>, PoolError> {
        K::pool(self).get(endpoint).await
    }
}

impl Default for ClientPools {
    fn default() -> Self {
        Self::new(ChannelSettings::default())
    }
}

impl fmt::Debug for ClientPools {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientPools").field("endpoints", &self.len()).finish()
    }
}
