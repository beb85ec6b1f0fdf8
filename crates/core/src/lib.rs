//! Face counting over large image collections.
//!
//! Records flow through a map stage ([`pipeline::record_processor`]) that
//! converts float samples to 8-bit RGB and runs a face detector, then through
//! a single-key reduce stage ([`pipeline::count_aggregator`]) that folds the
//! per-image counts into one `(images_processed, total_faces)` row.

pub mod shared {
    pub mod constants;
    pub mod image_record;
    pub mod job_config;
    pub mod pixel_buffer;
}

pub mod conversion {
    pub mod pixel_buffer_converter;
}

pub mod detection {
    pub mod domain {
        pub mod detector_factory;
        pub mod face_detector;
    }
    pub mod infrastructure;
}

pub mod distribution {
    pub mod domain {
        pub mod model_distributor;
    }
    pub mod infrastructure {
        pub mod distributed_cache;
    }
}

pub mod input {
    pub mod domain {
        pub mod input_split;
        pub mod record_reader;
    }
    pub mod infrastructure {
        pub mod image_bundle;
        pub mod image_file_reader;
    }
}

pub mod output {
    pub mod domain {
        pub mod result_sink;
    }
    pub mod infrastructure {
        pub mod text_output_writer;
    }
}

pub mod pipeline {
    pub mod count_aggregator;
    pub mod count_faces_use_case;
    pub mod job_counters;
    pub mod job_executor;
    pub mod pipeline_logger;
    pub mod record_processor;
    pub mod infrastructure {
        pub mod threaded_job_executor;
    }
}
