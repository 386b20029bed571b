//! Core library for the headtank demo.
//!
//! A webcam feed is sampled on a fixed period, the first detected face is
//! turned into a horizontal offset from the frame center, and that offset
//! accumulates into a rotation applied to the "Tank" object of a small 3D
//! scene rendered by an independent loop.
//!
//! Layout follows a domain / infrastructure split: `domain` modules hold
//! the traits and pure logic, `infrastructure` modules bind them to
//! ffmpeg, ONNX Runtime and wgpu.

pub mod shared {
    pub mod constants;
    pub mod frame;
    pub mod region;
    pub mod stream_metadata;
}

pub mod control {
    pub mod head_tracking_controller;
    pub mod shared_rotation;
}

pub mod detection {
    pub mod domain {
        pub mod face_detector;
    }
    pub mod infrastructure;
}

pub mod video {
    pub mod acquisition;
    pub mod domain {
        pub mod image_writer;
        pub mod video_source;
        pub mod video_writer;
    }
    pub mod infrastructure;
}

pub mod rendering {
    pub mod domain {
        pub mod camera;
        pub mod geometry;
        pub mod scene;
        pub mod scene_renderer;
    }
    pub mod infrastructure;
}

pub mod session {
    pub mod detection_cycle;
    pub mod render_loop;
    pub mod scheduler;
    pub mod session_config;
    pub mod session_error;
    pub mod session_logger;
    pub mod tracking_session;
}
