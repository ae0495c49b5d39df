pub mod shared {
    pub mod constants;
    pub mod frame;
    pub mod geometry;
    pub mod model_resolver;
}

pub mod capture {
    pub mod domain {
        pub mod capture_device;
        pub mod device_manager;
        pub mod external_stream;
        pub mod frame_source_adapter;
    }
    pub mod infrastructure;
}

pub mod detection {
    pub mod domain {
        pub mod face_detection;
        pub mod landmark_extractor;
        pub mod model_gate;
    }
    pub mod infrastructure;
}

pub mod features {
    pub mod domain {
        pub mod feature_computer;
        pub mod feature_snapshot;
    }
}

pub mod tracking {
    pub mod domain {
        pub mod oscillation;
        pub mod rolling_history;
        pub mod temporal_state;
        pub mod temporal_tracker;
    }
}

pub mod scoring {
    pub mod domain {
        pub mod attention_report;
        pub mod score_smoother;
        pub mod scoring_engine;
    }
}

pub mod reporting {
    pub mod domain {
        pub mod session_reporter;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod attention_engine;
    pub mod attention_session;
    pub mod pipeline_logger;
    pub mod session_config;
}
