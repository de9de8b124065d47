//! RPC surface of a replica
//!
//! [`ReplicaApi`] is the seam between clients (and gossiping peers) and a
//! replica. The coordinator implements it directly; transports implement it
//! by forwarding [`RpcRequest`]s and decoding [`RpcResponse`]s.
//!
//! Business errors travel inside [`RpcResponse::Error`] so a remote caller
//! sees the same `SightlineError` a local one would.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use sightline_core::{
    CameraDto, ObjectType, ObservableId, ObservableRef, ObservationDto, Result, SightlineError,
    UpdateRecord, VectorClock,
};

/// A response value paired with the replica's clock at the time it was
/// produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// Operation result
    pub value: T,
    /// Replica clock after the operation
    pub clock: VectorClock,
}

impl<T> Versioned<T> {
    /// Pair `value` with `clock`
    pub fn new(value: T, clock: VectorClock) -> Self {
        Self { value, clock }
    }
}

/// Operations a replica serves
///
/// Every client operation carries the caller's observed clock. Control
/// operations bypass clock handling.
#[async_trait]
pub trait ReplicaApi: Send + Sync {
    /// Register a camera
    async fn cam_join(&self, clock: VectorClock, camera: CameraDto)
        -> Result<Versioned<CameraDto>>;

    /// Look up a camera by name
    async fn cam_info(&self, clock: VectorClock, name: String) -> Result<Versioned<CameraDto>>;

    /// Record sightings of `targets` by `camera`
    async fn report(
        &self,
        clock: VectorClock,
        camera: String,
        targets: Vec<ObservableRef>,
    ) -> Result<VectorClock>;

    /// Most recent sighting of one object
    async fn track(
        &self,
        clock: VectorClock,
        object_type: ObjectType,
        id: ObservableId,
    ) -> Result<Versioned<Option<ObservationDto>>>;

    /// Most recent sighting of every object matching `pattern`
    async fn track_match(
        &self,
        clock: VectorClock,
        object_type: ObjectType,
        pattern: String,
    ) -> Result<Versioned<Vec<ObservationDto>>>;

    /// Every sighting of one object, newest first
    async fn trace(
        &self,
        clock: VectorClock,
        object_type: ObjectType,
        id: ObservableId,
    ) -> Result<Versioned<Vec<ObservationDto>>>;

    /// Update records the requester has not seen yet
    async fn query_replica(&self, clock: VectorClock) -> Result<Versioned<Vec<UpdateRecord>>>;

    /// Liveness check
    async fn ctrl_ping(&self, name: String) -> Result<String>;

    /// Wipe store and update logs
    async fn ctrl_clear(&self) -> Result<()>;

    /// Wipe, then load the demo dataset
    async fn ctrl_init(&self) -> Result<()>;
}

/// One call on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RpcRequest {
    /// See [`ReplicaApi::cam_join`]
    CamJoin {
        /// Caller clock
        clock: VectorClock,
        /// Camera to register
        camera: CameraDto,
    },
    /// See [`ReplicaApi::cam_info`]
    CamInfo {
        /// Caller clock
        clock: VectorClock,
        /// Camera name
        name: String,
    },
    /// See [`ReplicaApi::report`]
    Report {
        /// Caller clock
        clock: VectorClock,
        /// Reporting camera
        camera: String,
        /// Objects seen
        targets: Vec<ObservableRef>,
    },
    /// See [`ReplicaApi::track`]
    Track {
        /// Caller clock
        clock: VectorClock,
        /// Declared type
        object_type: ObjectType,
        /// Object id
        id: ObservableId,
    },
    /// See [`ReplicaApi::track_match`]
    TrackMatch {
        /// Caller clock
        clock: VectorClock,
        /// Declared type
        object_type: ObjectType,
        /// Key pattern
        pattern: String,
    },
    /// See [`ReplicaApi::trace`]
    Trace {
        /// Caller clock
        clock: VectorClock,
        /// Declared type
        object_type: ObjectType,
        /// Object id
        id: ObservableId,
    },
    /// See [`ReplicaApi::query_replica`]
    QueryReplica {
        /// Requester clock
        clock: VectorClock,
    },
    /// See [`ReplicaApi::ctrl_ping`]
    Ping {
        /// Name to greet
        name: String,
    },
    /// See [`ReplicaApi::ctrl_clear`]
    Clear,
    /// See [`ReplicaApi::ctrl_init`]
    Init,
}

impl RpcRequest {
    /// Operation name for logs
    pub fn operation(&self) -> &'static str {
        match self {
            Self::CamJoin { .. } => "cam_join",
            Self::CamInfo { .. } => "cam_info",
            Self::Report { .. } => "report",
            Self::Track { .. } => "track",
            Self::TrackMatch { .. } => "track_match",
            Self::Trace { .. } => "trace",
            Self::QueryReplica { .. } => "query_replica",
            Self::Ping { .. } => "ctrl_ping",
            Self::Clear => "ctrl_clear",
            Self::Init => "ctrl_init",
        }
    }
}

/// Answer to one [`RpcRequest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RpcResponse {
    /// `cam_join` / `cam_info`
    Camera(Versioned<CameraDto>),
    /// `report`
    Clock(VectorClock),
    /// `track`
    Tracked(Versioned<Option<ObservationDto>>),
    /// `track_match` / `trace`
    Observations(Versioned<Vec<ObservationDto>>),
    /// `query_replica`
    Updates(Versioned<Vec<UpdateRecord>>),
    /// `ctrl_ping`
    Greeting(String),
    /// `ctrl_clear` / `ctrl_init`
    Done,
    /// Any failure
    Error(SightlineError),
}

impl RpcResponse {
    fn from_result<T>(result: Result<T>, wrap: impl FnOnce(T) -> Self) -> Self {
        match result {
            Ok(value) => wrap(value),
            Err(e) => Self::Error(e),
        }
    }
}

/// Serve one request against `api`
pub async fn dispatch(api: &dyn ReplicaApi, request: RpcRequest) -> RpcResponse {
    match request {
        RpcRequest::CamJoin { clock, camera } => {
            RpcResponse::from_result(api.cam_join(clock, camera).await, RpcResponse::Camera)
        }
        RpcRequest::CamInfo { clock, name } => {
            RpcResponse::from_result(api.cam_info(clock, name).await, RpcResponse::Camera)
        }
        RpcRequest::Report {
            clock,
            camera,
            targets,
        } => RpcResponse::from_result(api.report(clock, camera, targets).await, RpcResponse::Clock),
        RpcRequest::Track {
            clock,
            object_type,
            id,
        } => RpcResponse::from_result(
            api.track(clock, object_type, id).await,
            RpcResponse::Tracked,
        ),
        RpcRequest::TrackMatch {
            clock,
            object_type,
            pattern,
        } => RpcResponse::from_result(
            api.track_match(clock, object_type, pattern).await,
            RpcResponse::Observations,
        ),
        RpcRequest::Trace {
            clock,
            object_type,
            id,
        } => RpcResponse::from_result(
            api.trace(clock, object_type, id).await,
            RpcResponse::Observations,
        ),
        RpcRequest::QueryReplica { clock } => {
            RpcResponse::from_result(api.query_replica(clock).await, RpcResponse::Updates)
        }
        RpcRequest::Ping { name } => {
            RpcResponse::from_result(api.ctrl_ping(name).await, RpcResponse::Greeting)
        }
        RpcRequest::Clear => RpcResponse::from_result(api.ctrl_clear().await, |()| RpcResponse::Done),
        RpcRequest::Init => RpcResponse::from_result(api.ctrl_init().await, |()| RpcResponse::Done),
    }
}

fn unexpected(operation: &str, response: &RpcResponse) -> SightlineError {
    SightlineError::internal(format!("unexpected response to {operation}: {response:?}"))
}

/// Sends requests to one remote replica
#[async_trait]
pub trait RpcChannel: Send + Sync {
    /// Round-trip one request
    async fn call(&self, request: RpcRequest) -> Result<RpcResponse>;
}

/// [`ReplicaApi`] over any [`RpcChannel`]
#[derive(Debug, Clone)]
pub struct RemoteReplica<C> {
    channel: C,
}

impl<C: RpcChannel> RemoteReplica<C> {
    /// Wrap `channel`
    pub fn new(channel: C) -> Self {
        Self { channel }
    }

    async fn call(&self, request: RpcRequest) -> Result<RpcResponse> {
        match self.channel.call(request).await? {
            RpcResponse::Error(e) => Err(e),
            response => Ok(response),
        }
    }
}

#[async_trait]
impl<C: RpcChannel> ReplicaApi for RemoteReplica<C> {
    async fn cam_join(
        &self,
        clock: VectorClock,
        camera: CameraDto,
    ) -> Result<Versioned<CameraDto>> {
        match self.call(RpcRequest::CamJoin { clock, camera }).await? {
            RpcResponse::Camera(v) => Ok(v),
            other => Err(unexpected("cam_join", &other)),
        }
    }

    async fn cam_info(&self, clock: VectorClock, name: String) -> Result<Versioned<CameraDto>> {
        match self.call(RpcRequest::CamInfo { clock, name }).await? {
            RpcResponse::Camera(v) => Ok(v),
            other => Err(unexpected("cam_info", &other)),
        }
    }

    async fn report(
        &self,
        clock: VectorClock,
        camera: String,
        targets: Vec<ObservableRef>,
    ) -> Result<VectorClock> {
        match self
            .call(RpcRequest::Report {
                clock,
                camera,
                targets,
            })
            .await?
        {
            RpcResponse::Clock(clock) => Ok(clock),
            other => Err(unexpected("report", &other)),
        }
    }

    async fn track(
        &self,
        clock: VectorClock,
        object_type: ObjectType,
        id: ObservableId,
    ) -> Result<Versioned<Option<ObservationDto>>> {
        match self
            .call(RpcRequest::Track {
                clock,
                object_type,
                id,
            })
            .await?
        {
            RpcResponse::Tracked(v) => Ok(v),
            other => Err(unexpected("track", &other)),
        }
    }

    async fn track_match(
        &self,
        clock: VectorClock,
        object_type: ObjectType,
        pattern: String,
    ) -> Result<Versioned<Vec<ObservationDto>>> {
        match self
            .call(RpcRequest::TrackMatch {
                clock,
                object_type,
                pattern,
            })
            .await?
        {
            RpcResponse::Observations(v) => Ok(v),
            other => Err(unexpected("track_match", &other)),
        }
    }

    async fn trace(
        &self,
        clock: VectorClock,
        object_type: ObjectType,
        id: ObservableId,
    ) -> Result<Versioned<Vec<ObservationDto>>> {
        match self
            .call(RpcRequest::Trace {
                clock,
                object_type,
                id,
            })
            .await?
        {
            RpcResponse::Observations(v) => Ok(v),
            other => Err(unexpected("trace", &other)),
        }
    }

    async fn query_replica(&self, clock: VectorClock) -> Result<Versioned<Vec<UpdateRecord>>> {
        match self.call(RpcRequest::QueryReplica { clock }).await? {
            RpcResponse::Updates(v) => Ok(v),
            other => Err(unexpected("query_replica", &other)),
        }
    }

    async fn ctrl_ping(&self, name: String) -> Result<String> {
        match self.call(RpcRequest::Ping { name }).await? {
            RpcResponse::Greeting(greeting) => Ok(greeting),
            other => Err(unexpected("ctrl_ping", &other)),
        }
    }

    async fn ctrl_clear(&self) -> Result<()> {
        match self.call(RpcRequest::Clear).await? {
            RpcResponse::Done => Ok(()),
            other => Err(unexpected("ctrl_clear", &other)),
        }
    }

    async fn ctrl_init(&self) -> Result<()> {
        match self.call(RpcRequest::Init).await? {
            RpcResponse::Done => Ok(()),
            other => Err(unexpected("ctrl_init", &other)),
        }
    }
}
